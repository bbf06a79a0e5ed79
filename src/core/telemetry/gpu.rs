//! Discrete-GPU telemetry, honoring the GPU's power state.
//!
//! The driver is only queried while the power-state controller reports the
//! GPU as usable; on any failure, or whenever the state is `PoweredOff` or
//! `Unknown`, the provider yields [`GpuInfo::EMPTY`] so callers never see a
//! partially-filled reading.

use async_trait::async_trait;

use super::power_state::{GpuPowerState, HybridGpuPower};
use crate::error::Result;

/// GPU readings for one poll cycle.
///
/// `EMPTY` (all `-1`) signals "no usable GPU telemetry this cycle" (GPU
/// absent, powered off, or driver query failed) and is distinct from a
/// successful zero reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuInfo {
    pub utilization: i32,
    pub core_clock: i32,
    pub max_core_clock: i32,
    pub memory_clock: i32,
    pub max_memory_clock: i32,
    pub temperature: i32,
    pub max_temperature: i32,
}

impl GpuInfo {
    pub const EMPTY: GpuInfo = GpuInfo {
        utilization: -1,
        core_clock: -1,
        max_core_clock: -1,
        memory_clock: -1,
        max_memory_clock: -1,
        temperature: -1,
        max_temperature: -1,
    };

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

/// GPU memory technology, as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryBusKind {
    Ddr,
    Gddr5,
    Gddr5x,
    Gddr6,
    Gddr6x,
    Gddr7,
    Hbm,
    Unknown,
}

impl MemoryBusKind {
    /// The driver reports an inflated transfer-rate-equivalent figure for
    /// GDDR memory, not the underlying clock; divide by this to correct it.
    pub fn clock_divisor(self) -> i32 {
        match self {
            MemoryBusKind::Gddr5 | MemoryBusKind::Gddr5x => 2,
            MemoryBusKind::Gddr6 | MemoryBusKind::Gddr6x => 4,
            MemoryBusKind::Gddr7 => 8,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GpuUtilization {
    /// 3D engine load, percent.
    pub graphics: u32,
    /// Video engine load, percent.
    pub video: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GpuClocks {
    pub core_mhz: u32,
    pub core_boost_mhz: u32,
    pub memory_mhz: u32,
    pub memory_boost_mhz: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GpuThermal {
    pub current: i32,
    pub default_max: i32,
}

/// GPU driver query library, scoped to the first physical GPU.
pub trait GpuDriver: Send + Sync {
    /// Initialize the driver library. Must be idempotent.
    fn initialize(&self) -> Result<()>;

    fn utilization(&self) -> Result<GpuUtilization>;

    fn clocks(&self) -> Result<GpuClocks>;

    /// First thermal sensor's current and default-maximum temperature.
    fn thermal(&self) -> Result<GpuThermal>;

    fn memory_kind(&self) -> Result<MemoryBusKind>;

    /// Frequency offset of the P0/3D-performance state entry, MHz. Can be
    /// negative.
    fn boost_offset_mhz(&self) -> Result<i32>;
}

/// Source of per-cycle GPU readings, as consumed by the sensor controller.
#[async_trait]
pub trait GpuSource: Send + Sync {
    async fn read(&self) -> GpuInfo;
}

/// GPU telemetry provider combining a driver query library with the external
/// power-state controller.
pub struct GpuTelemetry<D, P> {
    driver: D,
    power: P,
}

impl<D: GpuDriver, P: HybridGpuPower> GpuTelemetry<D, P> {
    pub fn new(driver: D, power: P) -> Self {
        Self { driver, power }
    }

    fn query(&self) -> Result<GpuInfo> {
        self.driver.initialize()?;

        let utilization = self.driver.utilization()?;
        let clocks = self.driver.clocks()?;
        let thermal = self.driver.thermal()?;
        let divisor = self.driver.memory_kind()?.clock_divisor();
        let boost_offset = self.driver.boost_offset_mhz()?;

        Ok(GpuInfo {
            utilization: utilization.graphics.max(utilization.video).min(100) as i32,
            core_clock: clocks.core_mhz as i32,
            max_core_clock: clocks.core_boost_mhz as i32 + boost_offset,
            memory_clock: clocks.memory_mhz as i32 / divisor,
            max_memory_clock: clocks.memory_boost_mhz as i32 / divisor,
            temperature: thermal.current,
            max_temperature: thermal.default_max,
        })
    }
}

#[async_trait]
impl<D: GpuDriver, P: HybridGpuPower> GpuSource for GpuTelemetry<D, P> {
    async fn read(&self) -> GpuInfo {
        if self.power.is_supported() {
            if let Err(e) = self.power.start().await {
                log::debug!("GPU power controller start failed: {}", e);
            }
        }

        // Querying a powered-off GPU can hang or throw; bail out before any
        // driver call.
        let state = self.power.last_known_state().await;
        if matches!(state, GpuPowerState::PoweredOff | GpuPowerState::Unknown) {
            return GpuInfo::EMPTY;
        }

        match self.query() {
            Ok(info) => info,
            Err(e) => {
                log::debug!("GPU telemetry query failed: {}", e);
                GpuInfo::EMPTY
            }
        }
    }
}
