//! Hardware-telemetry aggregation engine.
//!
//! Reconciles heterogeneous acquisition mechanisms (vendor management
//! interface, OS performance counters, the GPU driver query library, the
//! hardware enumeration library, frame-pacing instrumentation, SMBus
//! probing) behind one thread-safe polling contract.

pub mod controller;
pub mod cpu;
pub mod fps;
pub mod gpu;
pub mod hwmon;
pub mod membus;
pub mod names;
pub mod power_state;
pub mod runtime;
pub mod types;
pub mod vendor;

pub use controller::{SensorController, SensorsSource};
pub use cpu::{CpuCounters, PowerInfo};
pub use fps::{ForegroundQuery, FpsMonitor, FrameInspector};
pub use gpu::{GpuDriver, GpuInfo, GpuSource, GpuTelemetry, MemoryBusKind};
pub use hwmon::{HardwareDevice, HardwareMonitor, HardwareRole, HardwareTree, SensorKind};
pub use membus::MemoryBusThermal;
pub use names::strip_name;
pub use power_state::{GpuPowerState, HybridGpuPower};
pub use runtime::{PollIntervals, TelemetryRuntime};
pub use types::{FanSpeedTable, FpsData, SensorSample, SensorsData};
pub use vendor::{SensorLayout, VendorGateway};
