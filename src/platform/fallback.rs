//! Cross-platform fallback collaborators.
//!
//! Used on machines (or platforms) where a real backend is absent: every
//! call reports "unsupported" or "no data" so the engine degrades per-metric
//! instead of failing.

use async_trait::async_trait;
use parking_lot::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio_util::sync::CancellationToken;

use crate::core::telemetry::cpu::{CpuCounters, PowerInfo};
use crate::core::telemetry::fps::{ForegroundQuery, FrameCallback, FrameInspector};
use crate::core::telemetry::vendor::{FanId, SensorId, VendorGateway};
use crate::error::{Result, TelemetryError};

/// Vendor gateway for machines without a management interface.
#[derive(Debug, Default)]
pub struct NullVendorGateway;

#[async_trait]
impl VendorGateway for NullVendorGateway {
    async fn fan_table_exists(&self, _sensor: SensorId, _fan: FanId) -> Result<bool> {
        Ok(false)
    }

    async fn temperature(&self, _sensor: SensorId) -> Result<i32> {
        Err(TelemetryError::unsupported("no vendor interface"))
    }

    async fn fan_speed(&self, _sensor: SensorId, _fan: FanId) -> Result<i32> {
        Err(TelemetryError::unsupported("no vendor interface"))
    }

    async fn max_fan_speed(&self, _sensor: SensorId, _fan: FanId) -> Result<i32> {
        Err(TelemetryError::unsupported("no vendor interface"))
    }

    async fn max_cpu_core_clock(&self) -> Result<i32> {
        Err(TelemetryError::unsupported("no vendor interface"))
    }

    async fn generic_gpu_temperature(&self) -> Result<i32> {
        Err(TelemetryError::unsupported("no vendor interface"))
    }

    async fn generic_gpu_fan_speed(&self) -> Result<i32> {
        Err(TelemetryError::unsupported("no vendor interface"))
    }
}

/// Counter facility backed by `sysinfo` CPU usage, for platforms without
/// native performance counters. Only the per-core path is available.
pub struct SysinfoCpuCounters {
    system: Mutex<System>,
}

impl SysinfoCpuCounters {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoCpuCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CpuCounters for SysinfoCpuCounters {
    async fn reset(&self) -> Result<()> {
        self.system.lock().refresh_cpu_all();
        Ok(())
    }

    async fn per_core_usage(&self) -> Result<Vec<f64>> {
        let mut system = self.system.lock();
        system.refresh_cpu_all();
        Ok(system.cpus().iter().map(|c| c.cpu_usage() as f64).collect())
    }

    async fn idle_percent(&self) -> Result<f64> {
        Err(TelemetryError::unsupported("no idle-time counter"))
    }

    async fn utility_percent(&self) -> Result<f64> {
        Err(TelemetryError::unsupported("no utility counter"))
    }

    async fn performance_percent(&self) -> Result<f64> {
        // sysinfo has no counter for performance relative to base clock;
        // report nominal so the core-clock estimate falls back to base.
        let mut system = self.system.lock();
        system.refresh_cpu_all();
        if system.cpus().iter().any(|c| c.frequency() > 0) {
            Ok(100.0)
        } else {
            Err(TelemetryError::unsupported("no frequency data"))
        }
    }
}

/// Power info backed by `sysinfo` frequencies.
pub struct SysinfoPowerInfo {
    system: Mutex<System>,
}

impl SysinfoPowerInfo {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoPowerInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerInfo for SysinfoPowerInfo {
    fn logical_processors(&self) -> usize {
        self.system.lock().cpus().len()
    }

    fn base_clock_mhz(&self, processors: usize) -> Result<u32> {
        let mut system = self.system.lock();
        system.refresh_cpu_all();
        system
            .cpus()
            .iter()
            .take(processors)
            .map(|c| c.frequency() as u32)
            .max()
            .filter(|&f| f > 0)
            .ok_or_else(|| TelemetryError::unsupported("no frequency data"))
    }
}

/// Foreground query that also resolves names/liveness through `sysinfo`.
/// On platforms without a native window-focus query the foreground pid is
/// always `None`, keeping the FPS monitor permanently idle.
pub struct SysinfoForegroundQuery {
    system: Mutex<System>,
}

impl SysinfoForegroundQuery {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    fn refresh_process(&self, pid: u32) {
        self.system.lock().refresh_processes_specifics(
            ProcessesToUpdate::Some(&[Pid::from_u32(pid)]),
            true,
            ProcessRefreshKind::nothing(),
        );
    }
}

impl Default for SysinfoForegroundQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl ForegroundQuery for SysinfoForegroundQuery {
    fn foreground_pid(&self) -> Option<u32> {
        #[cfg(windows)]
        {
            super::windows::foreground_window_pid()
        }
        #[cfg(not(windows))]
        {
            None
        }
    }

    fn process_name(&self, pid: u32) -> Option<String> {
        self.refresh_process(pid);
        let system = self.system.lock();
        system
            .process(Pid::from_u32(pid))
            .map(|p| p.name().to_string_lossy().to_string())
    }

    fn is_running(&self, pid: u32) -> bool {
        self.refresh_process(pid);
        self.system.lock().process(Pid::from_u32(pid)).is_some()
    }
}

/// Frame inspector for builds without an instrumentation backend.
#[derive(Debug, Default)]
pub struct UnsupportedFrameInspector;

#[async_trait]
impl FrameInspector for UnsupportedFrameInspector {
    async fn monitor(
        &self,
        pid: u32,
        _callback: FrameCallback,
        _token: CancellationToken,
    ) -> Result<()> {
        Err(TelemetryError::frame_inspection(format!(
            "no frame-pacing backend available for pid {}",
            pid
        )))
    }
}
