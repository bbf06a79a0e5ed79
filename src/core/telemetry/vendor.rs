//! Interface to the vendor management-interface gateway.
//!
//! Temperature sensors and fans are addressed by opaque vendor IDs; which IDs
//! exist, and which ceilings apply, differs per hardware generation. A
//! generation is described entirely by a [`SensorLayout`] value, so new
//! hardware is added as a new layout constant, never as a branch in the
//! shared polling template.

use async_trait::async_trait;

use crate::error::Result;

pub type SensorId = u32;
pub type FanId = u32;

#[async_trait]
pub trait VendorGateway: Send + Sync {
    /// Whether the vendor interface exposes a fan table for this sensor/fan
    /// ID pair.
    async fn fan_table_exists(&self, sensor: SensorId, fan: FanId) -> Result<bool>;

    /// Current temperature for a sensor, in °C.
    async fn temperature(&self, sensor: SensorId) -> Result<i32>;

    /// Current fan speed, in RPM.
    async fn fan_speed(&self, sensor: SensorId, fan: FanId) -> Result<i32>;

    /// Physical maximum fan speed, in RPM. Constant per machine.
    async fn max_fan_speed(&self, sensor: SensorId, fan: FanId) -> Result<i32>;

    /// Physical maximum CPU core clock, in MHz. Constant per machine.
    async fn max_cpu_core_clock(&self) -> Result<i32>;

    /// Generic GPU temperature, used only when the GPU driver query yields
    /// nothing usable.
    async fn generic_gpu_temperature(&self) -> Result<i32>;

    /// Generic GPU fan speed, same fallback role as
    /// [`generic_gpu_temperature`](Self::generic_gpu_temperature).
    async fn generic_gpu_fan_speed(&self) -> Result<i32>;
}

/// Vendor sensor/fan IDs and default ceilings for one hardware generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorLayout {
    pub name: &'static str,
    pub cpu_sensor: SensorId,
    pub cpu_fan: FanId,
    pub gpu_sensor: SensorId,
    pub gpu_fan: FanId,
    pub chipset_sensor: SensorId,
    pub chipset_fan: FanId,
    /// Default temperature ceilings, °C.
    pub cpu_temp_ceiling: i32,
    pub gpu_temp_ceiling: i32,
    pub chipset_temp_ceiling: i32,
}

impl SensorLayout {
    /// Layout used by most supported machines.
    pub const STANDARD: SensorLayout = SensorLayout {
        name: "standard",
        cpu_sensor: 3,
        cpu_fan: 0,
        gpu_sensor: 4,
        gpu_fan: 1,
        chipset_sensor: 5,
        chipset_fan: 2,
        cpu_temp_ceiling: 100,
        gpu_temp_ceiling: 100,
        chipset_temp_ceiling: 100,
    };

    /// Newer generation: chipset sensor moved and rated for 120 °C.
    pub const EXTENDED: SensorLayout = SensorLayout {
        name: "extended",
        cpu_sensor: 3,
        cpu_fan: 0,
        gpu_sensor: 4,
        gpu_fan: 1,
        chipset_sensor: 6,
        chipset_fan: 2,
        cpu_temp_ceiling: 100,
        gpu_temp_ceiling: 100,
        chipset_temp_ceiling: 120,
    };
}
