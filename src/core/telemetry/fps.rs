//! Foreground-process frame-rate monitor.
//!
//! A single loop watches which process owns the foreground window and keeps
//! at most one frame-pacing instrumentation session attached to it. Sessions
//! are structured: each runs under a child token of the engine token, and a
//! new session starts only after the previous one has been canceled and
//! joined. The last-monitored pid is sticky across stops, so re-focusing the
//! same process does not restart instrumentation.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::types::FpsData;
use crate::core::blacklist::ProcessBlacklist;
use crate::error::Result;

/// Pids that never belong to a monitorable process: 0 is "no process", 4 is
/// the Windows kernel.
const EXCLUDED_PIDS: [u32; 2] = [0, 4];

/// Native window-focus query.
pub trait ForegroundQuery: Send + Sync {
    /// Process id owning the currently focused top-level window.
    fn foreground_pid(&self) -> Option<u32>;

    fn process_name(&self, pid: u32) -> Option<String>;

    fn is_running(&self, pid: u32) -> bool;
}

pub type FrameCallback = Arc<dyn Fn(FpsData) + Send + Sync>;

/// Frame-pacing inspection library: invokes the callback repeatedly for the
/// target process until the token is canceled.
#[async_trait]
pub trait FrameInspector: Send + Sync {
    async fn monitor(&self, pid: u32, callback: FrameCallback, token: CancellationToken)
        -> Result<()>;
}

struct Session {
    pid: u32,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct FpsMonitor {
    foreground: Arc<dyn ForegroundQuery>,
    inspector: Arc<dyn FrameInspector>,
    blacklist: ProcessBlacklist,

    latest: Arc<SyncMutex<FpsData>>,
    changed_tx: watch::Sender<FpsData>,

    // At most one live session per engine instance; the lock covers the
    // stop-then-start transition.
    session: Mutex<Option<Session>>,
    last_pid: AtomicU32,
}

impl FpsMonitor {
    pub fn new(
        foreground: Arc<dyn ForegroundQuery>,
        inspector: Arc<dyn FrameInspector>,
        blacklist: ProcessBlacklist,
    ) -> Self {
        let (changed_tx, _) = watch::channel(FpsData::empty());
        Self {
            foreground,
            inspector,
            blacklist,
            latest: Arc::new(SyncMutex::new(FpsData::empty())),
            changed_tx,
            session: Mutex::new(None),
            last_pid: AtomicU32::new(0),
        }
    }

    /// Latest accepted frame-pacing sample, or the sentinel when idle.
    pub fn latest(&self) -> FpsData {
        self.latest.lock().clone()
    }

    /// Change notifications: fires on every accepted callback and on every
    /// session stop (so subscribers promptly show "no data", never stale
    /// numbers).
    pub fn subscribe(&self) -> watch::Receiver<FpsData> {
        self.changed_tx.subscribe()
    }

    /// Run the monitoring loop at the given cadence until the engine token
    /// is canceled.
    pub async fn run(&self, engine_token: CancellationToken, poll_interval: Duration) {
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = engine_token.cancelled() => break,
                _ = ticker.tick() => self.poll_once(&engine_token).await,
            }
        }

        // Leave no orphaned instrumentation behind on any exit path.
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            self.stop_session(session).await;
        }
    }

    /// One iteration of the state machine. Public so the cadence can be
    /// driven externally.
    pub async fn poll_once(&self, engine_token: &CancellationToken) {
        let target = self.valid_foreground_pid();

        let mut session = self.session.lock().await;

        if let Some(current) = session.as_ref() {
            let exited = !self.foreground.is_running(current.pid);
            let inspector_done = current.handle.is_finished();
            let changed = target != Some(current.pid);

            if exited || inspector_done || changed {
                let current = session.take().unwrap();
                self.stop_session(current).await;
            }
        }

        if session.is_none() {
            if let Some(pid) = target {
                // Sticky last pid: only a *new* foreground process starts a
                // session.
                if pid != self.last_pid.load(Ordering::Relaxed) {
                    self.last_pid.store(pid, Ordering::Relaxed);
                    *session = Some(self.start_session(pid, engine_token));
                }
            }
        }
    }

    fn valid_foreground_pid(&self) -> Option<u32> {
        let pid = self.foreground.foreground_pid()?;
        if EXCLUDED_PIDS.contains(&pid) {
            return None;
        }
        if let Some(name) = self.foreground.process_name(pid) {
            if self.blacklist.is_blocked(&name) {
                return None;
            }
        }
        Some(pid)
    }

    fn start_session(&self, pid: u32, engine_token: &CancellationToken) -> Session {
        log::debug!("starting frame monitoring for pid {}", pid);

        let token = engine_token.child_token();
        let inspector = self.inspector.clone();
        let latest = self.latest.clone();
        let changed_tx = self.changed_tx.clone();
        let session_token = token.clone();

        let handle = tokio::spawn(async move {
            let sink_latest = latest.clone();
            let sink_tx = changed_tx.clone();
            let callback: FrameCallback = Arc::new(move |data: FpsData| {
                *sink_latest.lock() = data.clone();
                let _ = sink_tx.send(data);
            });

            if let Err(e) = inspector.monitor(pid, callback, session_token).await {
                log::warn!("frame inspection failed for pid {}: {}", pid, e);
            }
        });

        Session { pid, token, handle }
    }

    async fn stop_session(&self, session: Session) {
        log::debug!("stopping frame monitoring for pid {}", session.pid);

        session.token.cancel();
        if let Err(e) = session.handle.await {
            if !e.is_cancelled() {
                log::warn!("frame monitoring task for pid {} panicked: {}", session.pid, e);
            }
        }

        let empty = FpsData::empty();
        *self.latest.lock() = empty.clone();
        let _ = self.changed_tx.send(empty);
    }
}
