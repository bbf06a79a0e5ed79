//! Shared polling/caching template for vendor sensor variants.
//!
//! One [`SensorController`] implements the whole acquisition algorithm;
//! hardware generations differ only in the [`SensorLayout`] they are
//! constructed with. Every acquisition step is independently best-effort: a
//! failing metric becomes `-1`, never an error out of [`get_data`].
//!
//! [`get_data`]: SensorController::get_data

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use tokio::time::{sleep, Duration};

use super::cpu::{cpu_core_clock, cpu_utilization, CpuCounters, PowerInfo, COUNTER_SETTLE_MS};
use super::gpu::GpuSource;
use super::types::{FanSpeedTable, SensorSample, SensorsData};
use super::vendor::{FanId, SensorId, SensorLayout, VendorGateway};
use crate::error::Result;

/// Readings below this are normalized to the `-1` sentinel. A genuine zero
/// (a stopped fan is plausible) is therefore indistinguishable from a
/// missing sensor; the threshold is kept as-is for compatibility with the
/// vendor tooling this engine replaces.
const MIN_VALID_READING: i32 = 1;

fn normalize(value: i32) -> i32 {
    if value < MIN_VALID_READING {
        -1
    } else {
        value
    }
}

/// The polling contract exposed to snapshot consumers.
#[async_trait]
pub trait SensorsSource: Send + Sync {
    /// Probe whether this variant's sensor/fan tables exist on the machine.
    async fn is_supported(&self) -> bool;

    /// Reset and prime performance counters before the first real poll.
    async fn prepare(&self) -> Result<()>;

    /// Produce one coherent three-domain snapshot. Never fails; unavailable
    /// metrics are `-1`.
    async fn get_data(&self) -> SensorsData;

    /// Fan-RPM-only projection of [`get_data`](Self::get_data).
    async fn fan_speeds(&self) -> FanSpeedTable;
}

pub struct SensorController {
    gateway: Arc<dyn VendorGateway>,
    counters: Arc<dyn CpuCounters>,
    power_info: Arc<dyn PowerInfo>,
    gpu: Arc<dyn GpuSource>,
    layout: SensorLayout,

    // Physical ceilings, queried at most once per controller lifetime.
    // Concurrent first resolution by two poll loops is a benign race: the
    // underlying values are idempotent constants, so duplicate fetches can
    // only ever store the same value.
    base_clock_mhz: OnceCell<i32>,
    max_cpu_core_clock: OnceCell<i32>,
    max_cpu_fan: OnceCell<i32>,
    max_gpu_fan: OnceCell<i32>,
    max_chipset_fan: OnceCell<i32>,
}

impl SensorController {
    pub fn new(
        gateway: Arc<dyn VendorGateway>,
        counters: Arc<dyn CpuCounters>,
        power_info: Arc<dyn PowerInfo>,
        gpu: Arc<dyn GpuSource>,
        layout: SensorLayout,
    ) -> Self {
        Self {
            gateway,
            counters,
            power_info,
            gpu,
            layout,
            base_clock_mhz: OnceCell::new(),
            max_cpu_core_clock: OnceCell::new(),
            max_cpu_fan: OnceCell::new(),
            max_gpu_fan: OnceCell::new(),
            max_chipset_fan: OnceCell::new(),
        }
    }

    pub fn layout(&self) -> &SensorLayout {
        &self.layout
    }

    fn base_clock(&self) -> i32 {
        if let Some(&v) = self.base_clock_mhz.get() {
            return v;
        }
        let processors = self
            .power_info
            .logical_processors()
            .min(super::cpu::MAX_LOGICAL_PROCESSORS);
        match self.power_info.base_clock_mhz(processors) {
            Ok(mhz) if mhz > 0 => *self.base_clock_mhz.get_or_init(|| mhz as i32),
            Ok(_) => -1,
            Err(e) => {
                log::debug!("base clock query failed: {}", e);
                -1
            }
        }
    }

    async fn max_cpu_core_clock(&self) -> i32 {
        if let Some(&v) = self.max_cpu_core_clock.get() {
            return v;
        }
        match self.gateway.max_cpu_core_clock().await {
            Ok(v) => *self.max_cpu_core_clock.get_or_init(|| normalize(v)),
            Err(e) => {
                log::debug!("max CPU core clock query failed: {}", e);
                -1
            }
        }
    }

    async fn cached_max_fan(&self, cell: &OnceCell<i32>, sensor: SensorId, fan: FanId) -> i32 {
        if let Some(&v) = cell.get() {
            return v;
        }
        match self.gateway.max_fan_speed(sensor, fan).await {
            Ok(v) => *cell.get_or_init(|| normalize(v)),
            Err(e) => {
                log::debug!("max fan speed query failed for sensor {}: {}", sensor, e);
                -1
            }
        }
    }

    async fn temperature(&self, sensor: SensorId) -> i32 {
        match self.gateway.temperature(sensor).await {
            Ok(v) => normalize(v),
            Err(e) => {
                log::debug!("temperature query failed for sensor {}: {}", sensor, e);
                -1
            }
        }
    }

    async fn fan_speed(&self, sensor: SensorId, fan: FanId) -> i32 {
        match self.gateway.fan_speed(sensor, fan).await {
            Ok(v) => normalize(v),
            Err(e) => {
                log::debug!("fan speed query failed for sensor {}: {}", sensor, e);
                -1
            }
        }
    }

    async fn cpu_sample(&self) -> SensorSample {
        let layout = self.layout;
        let (utilization, performance, temperature, fan_speed, max_fan_speed, max_core_clock) = tokio::join!(
            cpu_utilization(&*self.counters),
            async {
                self.counters
                    .performance_percent()
                    .await
                    .unwrap_or(f64::NAN)
            },
            self.temperature(layout.cpu_sensor),
            self.fan_speed(layout.cpu_sensor, layout.cpu_fan),
            self.cached_max_fan(&self.max_cpu_fan, layout.cpu_sensor, layout.cpu_fan),
            self.max_cpu_core_clock(),
        );

        SensorSample {
            utilization,
            max_utilization: 100,
            core_clock: cpu_core_clock(self.base_clock(), performance),
            max_core_clock,
            memory_clock: -1,
            max_memory_clock: -1,
            temperature,
            max_temperature: layout.cpu_temp_ceiling,
            fan_speed,
            max_fan_speed,
        }
    }

    async fn gpu_sample(&self) -> SensorSample {
        let layout = self.layout;
        let (info, fan_speed, max_fan_speed) = tokio::join!(
            self.gpu.read(),
            self.fan_speed(layout.gpu_sensor, layout.gpu_fan),
            self.cached_max_fan(&self.max_gpu_fan, layout.gpu_sensor, layout.gpu_fan),
        );

        if info.is_empty() {
            // No usable driver telemetry this cycle; the vendor interface's
            // generic GPU calls and ceiling are the fallback.
            let temperature = match self.gateway.generic_gpu_temperature().await {
                Ok(v) => normalize(v),
                Err(_) => -1,
            };
            let generic_fan = match self.gateway.generic_gpu_fan_speed().await {
                Ok(v) => normalize(v),
                Err(_) => -1,
            };
            return SensorSample {
                temperature,
                max_temperature: layout.gpu_temp_ceiling,
                fan_speed: if fan_speed > 0 { fan_speed } else { generic_fan },
                max_fan_speed,
                ..SensorSample::EMPTY
            };
        }

        SensorSample {
            utilization: info.utilization,
            max_utilization: 100,
            core_clock: info.core_clock,
            max_core_clock: info.max_core_clock,
            memory_clock: info.memory_clock,
            max_memory_clock: info.max_memory_clock,
            temperature: normalize(info.temperature),
            max_temperature: if info.max_temperature > 0 {
                info.max_temperature
            } else {
                layout.gpu_temp_ceiling
            },
            fan_speed,
            max_fan_speed,
        }
    }

    async fn prime_counters(&self) {
        let _ = tokio::join!(
            self.counters.per_core_usage(),
            self.counters.idle_percent(),
            self.counters.utility_percent(),
        );
    }

    async fn chipset_sample(&self) -> SensorSample {
        let layout = self.layout;
        let (temperature, fan_speed, max_fan_speed) = tokio::join!(
            self.temperature(layout.chipset_sensor),
            self.fan_speed(layout.chipset_sensor, layout.chipset_fan),
            self.cached_max_fan(
                &self.max_chipset_fan,
                layout.chipset_sensor,
                layout.chipset_fan
            ),
        );

        SensorSample {
            temperature,
            max_temperature: layout.chipset_temp_ceiling,
            fan_speed,
            max_fan_speed,
            ..SensorSample::EMPTY
        }
    }
}

#[async_trait]
impl SensorsSource for SensorController {
    async fn is_supported(&self) -> bool {
        let layout = self.layout;
        let cpu_table = self
            .gateway
            .fan_table_exists(layout.cpu_sensor, layout.cpu_fan)
            .await
            .unwrap_or(false);
        let chipset_table = self
            .gateway
            .fan_table_exists(layout.chipset_sensor, layout.chipset_fan)
            .await
            .unwrap_or(false);

        let supported = cpu_table && chipset_table;
        if supported {
            // One throwaway full read to warm the memoized ceilings.
            let _ = self.get_data().await;
        }
        supported
    }

    async fn prepare(&self) -> Result<()> {
        self.counters.reset().await?;
        // The first read after a reset is meaningless; sample, settle,
        // sample. Both the per-core and the aggregate counters are primed so
        // every stage of the utilization fallback chain starts settled.
        self.prime_counters().await;
        sleep(Duration::from_millis(COUNTER_SETTLE_MS)).await;
        self.prime_counters().await;
        Ok(())
    }

    async fn get_data(&self) -> SensorsData {
        // All sub-reads issued concurrently and joined, so the snapshot is
        // coherent to the granularity of the slowest sub-read.
        let (cpu, gpu, chipset) =
            tokio::join!(self.cpu_sample(), self.gpu_sample(), self.chipset_sample());

        SensorsData { cpu, gpu, chipset }
    }

    async fn fan_speeds(&self) -> FanSpeedTable {
        let layout = self.layout;
        let (cpu_fan_rpm, gpu_fan_rpm, chipset_fan_rpm) = tokio::join!(
            self.fan_speed(layout.cpu_sensor, layout.cpu_fan),
            self.fan_speed(layout.gpu_sensor, layout.gpu_fan),
            self.fan_speed(layout.chipset_sensor, layout.chipset_fan),
        );

        FanSpeedTable {
            cpu_fan_rpm,
            gpu_fan_rpm,
            chipset_fan_rpm,
        }
    }
}
