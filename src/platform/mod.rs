//! Platform-specific backends for the engine's collaborator traits.

pub mod fallback;
pub mod tree;

#[cfg(feature = "nvml")]
pub mod nvml;

#[cfg(windows)]
pub mod windows;

use std::sync::Arc;

use crate::core::telemetry::cpu::{CpuCounters, PowerInfo};

/// Best available performance-counter facility for this platform.
pub fn cpu_counters() -> Arc<dyn CpuCounters> {
    #[cfg(windows)]
    {
        Arc::new(windows::WmiCpuCounters)
    }
    #[cfg(not(windows))]
    {
        Arc::new(fallback::SysinfoCpuCounters::new())
    }
}

/// Best available base-clock query for this platform.
pub fn power_info() -> Arc<dyn PowerInfo> {
    #[cfg(windows)]
    {
        Arc::new(windows::NtPowerInfo)
    }
    #[cfg(not(windows))]
    {
        Arc::new(fallback::SysinfoPowerInfo::new())
    }
}
