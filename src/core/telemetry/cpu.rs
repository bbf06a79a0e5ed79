//! CPU utilization and clock readings built on OS performance counters.
//!
//! Counters have two quirks the rest of the engine must never see: the first
//! sample after a reset is meaningless, and any individual counter can be
//! missing on a given machine. [`cpu_utilization`] hides the second behind a
//! fallback chain; sample-settle-sample priming in the controller hides the
//! first.

use async_trait::async_trait;

use crate::error::Result;

/// Counters' first read after a reset is meaningless; this is how long we
/// wait between the throwaway sample and the first real one.
pub const COUNTER_SETTLE_MS: u64 = 500;

/// Logical-processor cap for the native power-information query.
pub const MAX_LOGICAL_PROCESSORS: usize = 32;

/// OS performance-counter facility for processor utilization.
#[async_trait]
pub trait CpuCounters: Send + Sync {
    /// Reset and re-enumerate counter instances (aggregate and per-core).
    async fn reset(&self) -> Result<()>;

    /// "% Processor Time" per logical core.
    async fn per_core_usage(&self) -> Result<Vec<f64>>;

    /// Aggregate "% Idle Time".
    async fn idle_percent(&self) -> Result<f64>;

    /// Raw "% Processor Utility".
    async fn utility_percent(&self) -> Result<f64>;

    /// "% Processor Performance" relative to base clock; can exceed 100.
    async fn performance_percent(&self) -> Result<f64>;
}

/// Native power-information query: per-logical-processor max clock.
pub trait PowerInfo: Send + Sync {
    fn logical_processors(&self) -> usize;

    /// Max (base) clock in MHz, queried across `processors` logical CPUs.
    fn base_clock_mhz(&self, processors: usize) -> Result<u32>;
}

fn finite_percent(value: f64) -> Option<i32> {
    if value.is_finite() && value >= 0.0 {
        Some((value.round() as i32).clamp(0, 100))
    } else {
        None
    }
}

/// Current CPU utilization in percent, or `-1` when no counter yields a
/// finite non-negative value.
///
/// Preference order: average of per-core "% Processor Time", then
/// `100 − idle`, then the raw "% Processor Utility" counter.
pub async fn cpu_utilization(counters: &dyn CpuCounters) -> i32 {
    if let Ok(cores) = counters.per_core_usage().await {
        if !cores.is_empty() {
            let avg = cores.iter().sum::<f64>() / cores.len() as f64;
            if let Some(v) = finite_percent(avg) {
                return v;
            }
        }
    }

    if let Ok(idle) = counters.idle_percent().await {
        if let Some(v) = finite_percent(100.0 - idle) {
            return v;
        }
    }

    if let Ok(utility) = counters.utility_percent().await {
        if let Some(v) = finite_percent(utility) {
            return v;
        }
    }

    -1
}

/// Current CPU core clock from the base clock and the "% Processor
/// Performance" counter, or `-1` when the result is non-positive.
pub fn cpu_core_clock(base_clock_mhz: i32, performance_percent: f64) -> i32 {
    if base_clock_mhz <= 0 || !performance_percent.is_finite() {
        return -1;
    }
    let clock = (base_clock_mhz as f64 * performance_percent / 100.0).round() as i32;
    if clock > 0 {
        clock
    } else {
        -1
    }
}
