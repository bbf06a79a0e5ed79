//! Background poll loops publishing telemetry snapshots.
//!
//! Each consumer-facing loop runs independently at its own configured
//! interval; the engine deliberately does not deduplicate concurrent polls,
//! so two loops may issue the same vendor call redundantly. All loops shut
//! down through one engine-level cancellation token.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::controller::SensorsSource;
use super::fps::FpsMonitor;
use super::types::{FpsData, SensorsData};

#[derive(Debug, Clone, Copy)]
pub struct PollIntervals {
    pub sensors: Duration,
    pub fps: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            sensors: Duration::from_secs(2),
            fps: Duration::from_secs(1),
        }
    }
}

/// Handle to the running telemetry loops.
pub struct TelemetryRuntime {
    /// Receiver for sensor snapshots.
    pub sensors_rx: watch::Receiver<SensorsData>,

    /// Receiver for frame-pacing samples.
    pub fps_rx: watch::Receiver<FpsData>,

    token: CancellationToken,
}

impl TelemetryRuntime {
    /// Spawn the sensor poll loop and the FPS monitor loop on the current
    /// tokio runtime.
    pub fn spawn(
        sensors: Arc<dyn SensorsSource>,
        fps: Arc<FpsMonitor>,
        intervals: PollIntervals,
    ) -> Self {
        let token = CancellationToken::new();

        let (sensors_tx, sensors_rx) = watch::channel(SensorsData::EMPTY);
        let fps_rx = fps.subscribe();

        tokio::spawn(sensors_loop(
            sensors,
            sensors_tx,
            intervals.sensors,
            token.child_token(),
        ));

        let fps_token = token.child_token();
        let fps_interval = intervals.fps;
        tokio::spawn(async move { fps.run(fps_token, fps_interval).await });

        Self {
            sensors_rx,
            fps_rx,
            token,
        }
    }

    /// Shut down every loop, canceling in-flight sessions.
    pub fn shutdown(&self) {
        self.token.cancel();
    }
}

impl Drop for TelemetryRuntime {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn sensors_loop(
    source: Arc<dyn SensorsSource>,
    tx: watch::Sender<SensorsData>,
    poll_interval: Duration,
    token: CancellationToken,
) {
    if !source.is_supported().await {
        log::info!("sensor controller unsupported on this machine");
        let _ = tx.send(SensorsData::EMPTY);
        return;
    }

    if let Err(e) = source.prepare().await {
        log::warn!("sensor counter priming failed: {}", e);
    }

    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let data = source.get_data().await;
                // send() only fails when every receiver is gone, which is fine
                let _ = tx.send(data);
            }
        }
    }

    log::debug!("sensor poll loop terminated");
}
