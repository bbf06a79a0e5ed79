//! Plain data carriers shared by every telemetry source.
//!
//! The engine-wide sentinel for "metric unavailable" is `-1`, never zero:
//! a zero is always a genuine reading. Consumers must treat any negative
//! value as missing data.

use serde::Serialize;

/// One domain's worth of sensor readings together with their physical ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorSample {
    pub utilization: i32,
    pub max_utilization: i32,
    pub core_clock: i32,
    pub max_core_clock: i32,
    pub memory_clock: i32,
    pub max_memory_clock: i32,
    pub temperature: i32,
    pub max_temperature: i32,
    pub fan_speed: i32,
    pub max_fan_speed: i32,
}

impl SensorSample {
    /// Well-known "everything unavailable" instance.
    pub const EMPTY: SensorSample = SensorSample {
        utilization: -1,
        max_utilization: -1,
        core_clock: -1,
        max_core_clock: -1,
        memory_clock: -1,
        max_memory_clock: -1,
        temperature: -1,
        max_temperature: -1,
        fan_speed: -1,
        max_fan_speed: -1,
    };
}

impl Default for SensorSample {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Immutable three-domain snapshot produced atomically per poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct SensorsData {
    pub cpu: SensorSample,
    pub gpu: SensorSample,
    pub chipset: SensorSample,
}

impl SensorsData {
    /// Returned when polling fails or is disabled.
    pub const EMPTY: SensorsData = SensorsData {
        cpu: SensorSample::EMPTY,
        gpu: SensorSample::EMPTY,
        chipset: SensorSample::EMPTY,
    };
}

/// Lighter-weight projection for callers needing only fan RPM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct FanSpeedTable {
    pub cpu_fan_rpm: i32,
    pub gpu_fan_rpm: i32,
    pub chipset_fan_rpm: i32,
}

/// Display-ready frame-pacing sample, refreshed on every inspector callback.
///
/// String-typed by contract with the presentation layer; `"-1"` means
/// "no data".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FpsData {
    pub fps: String,
    pub low_fps: String,
    pub frame_time: String,
}

impl FpsData {
    pub const SENTINEL: &'static str = "-1";

    /// The "no data" instance published after a monitoring session stops.
    pub fn empty() -> Self {
        Self {
            fps: Self::SENTINEL.to_string(),
            low_fps: Self::SENTINEL.to_string(),
            frame_time: Self::SENTINEL.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fps == Self::SENTINEL
    }
}

impl Default for FpsData {
    fn default() -> Self {
        Self::empty()
    }
}
