//! Interface to the external discrete-GPU power-state lifecycle controller.
//!
//! The controller itself lives outside this crate; the engine only ever asks
//! it to spin the GPU subsystem up and reads its last known state before
//! touching the driver, because querying a powered-off GPU can hang or throw.

use async_trait::async_trait;

use crate::error::Result;

/// Lifecycle state of a laptop's switchable discrete GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuPowerState {
    Unknown,
    PoweredOff,
    Inactive,
    Active,
    MonitorConnected,
    NvidiaGpuNotFound,
}

impl GpuPowerState {
    /// States in which issuing driver queries is safe and worthwhile.
    pub fn is_queryable(self) -> bool {
        matches!(self, GpuPowerState::Active | GpuPowerState::MonitorConnected)
    }
}

#[async_trait]
pub trait HybridGpuPower: Send + Sync {
    fn is_supported(&self) -> bool;

    /// Request that the GPU subsystem be started. Best-effort.
    async fn start(&self) -> Result<()>;

    async fn last_known_state(&self) -> GpuPowerState;
}

/// Power controller for machines without switchable graphics: the GPU, if
/// present, is always powered.
#[derive(Debug, Default)]
pub struct AlwaysActiveGpu;

#[async_trait]
impl HybridGpuPower for AlwaysActiveGpu {
    fn is_supported(&self) -> bool {
        false
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn last_known_state(&self) -> GpuPowerState {
        GpuPowerState::Active
    }
}
