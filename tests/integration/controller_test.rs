use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use hwpulse::core::telemetry::cpu::{CpuCounters, PowerInfo};
use hwpulse::core::telemetry::gpu::{GpuInfo, GpuSource};
use hwpulse::core::telemetry::vendor::{FanId, SensorId, SensorLayout, VendorGateway};
use hwpulse::core::telemetry::{SensorController, SensorSample, SensorsSource};
use hwpulse::error::{Result, TelemetryError};

/// Gateway spy returning fixed readings and counting ceiling queries.
#[derive(Default)]
struct SpyGateway {
    max_fan_calls: AtomicUsize,
    max_clock_calls: AtomicUsize,
    temperature_value: i32,
    fan_value: i32,
}

impl SpyGateway {
    fn healthy() -> Self {
        Self {
            temperature_value: 55,
            fan_value: 3200,
            ..Default::default()
        }
    }
}

#[async_trait]
impl VendorGateway for SpyGateway {
    async fn fan_table_exists(&self, _sensor: SensorId, _fan: FanId) -> Result<bool> {
        Ok(true)
    }

    async fn temperature(&self, _sensor: SensorId) -> Result<i32> {
        Ok(self.temperature_value)
    }

    async fn fan_speed(&self, _sensor: SensorId, _fan: FanId) -> Result<i32> {
        Ok(self.fan_value)
    }

    async fn max_fan_speed(&self, _sensor: SensorId, _fan: FanId) -> Result<i32> {
        self.max_fan_calls.fetch_add(1, Ordering::SeqCst);
        Ok(5100)
    }

    async fn max_cpu_core_clock(&self) -> Result<i32> {
        self.max_clock_calls.fetch_add(1, Ordering::SeqCst);
        Ok(5200)
    }

    async fn generic_gpu_temperature(&self) -> Result<i32> {
        Ok(62)
    }

    async fn generic_gpu_fan_speed(&self) -> Result<i32> {
        Ok(2800)
    }
}

/// Gateway where every call fails.
struct DeadGateway;

#[async_trait]
impl VendorGateway for DeadGateway {
    async fn fan_table_exists(&self, _sensor: SensorId, _fan: FanId) -> Result<bool> {
        Err(TelemetryError::vendor("gone"))
    }

    async fn temperature(&self, _sensor: SensorId) -> Result<i32> {
        Err(TelemetryError::vendor("gone"))
    }

    async fn fan_speed(&self, _sensor: SensorId, _fan: FanId) -> Result<i32> {
        Err(TelemetryError::vendor("gone"))
    }

    async fn max_fan_speed(&self, _sensor: SensorId, _fan: FanId) -> Result<i32> {
        Err(TelemetryError::vendor("gone"))
    }

    async fn max_cpu_core_clock(&self) -> Result<i32> {
        Err(TelemetryError::vendor("gone"))
    }

    async fn generic_gpu_temperature(&self) -> Result<i32> {
        Err(TelemetryError::vendor("gone"))
    }

    async fn generic_gpu_fan_speed(&self) -> Result<i32> {
        Err(TelemetryError::vendor("gone"))
    }
}

#[derive(Default)]
struct SpyCounters {
    reset_calls: AtomicUsize,
    sample_calls: AtomicUsize,
    idle_calls: AtomicUsize,
    utility_calls: AtomicUsize,
    broken: bool,
}

#[async_trait]
impl CpuCounters for SpyCounters {
    async fn reset(&self) -> Result<()> {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn per_core_usage(&self) -> Result<Vec<f64>> {
        self.sample_calls.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            Err(TelemetryError::unsupported("no counters"))
        } else {
            Ok(vec![20.0, 40.0, 30.0, 30.0])
        }
    }

    async fn idle_percent(&self) -> Result<f64> {
        self.idle_calls.fetch_add(1, Ordering::SeqCst);
        Err(TelemetryError::unsupported("no counters"))
    }

    async fn utility_percent(&self) -> Result<f64> {
        self.utility_calls.fetch_add(1, Ordering::SeqCst);
        Err(TelemetryError::unsupported("no counters"))
    }

    async fn performance_percent(&self) -> Result<f64> {
        if self.broken {
            Err(TelemetryError::unsupported("no counters"))
        } else {
            Ok(120.0)
        }
    }
}

struct SpyPowerInfo {
    calls: AtomicUsize,
}

impl SpyPowerInfo {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl PowerInfo for SpyPowerInfo {
    fn logical_processors(&self) -> usize {
        8
    }

    fn base_clock_mhz(&self, processors: usize) -> Result<u32> {
        assert!(processors <= 32);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(2500)
    }
}

struct FixedGpu(GpuInfo);

#[async_trait]
impl GpuSource for FixedGpu {
    async fn read(&self) -> GpuInfo {
        self.0
    }
}

fn controller_with(
    gateway: Arc<dyn VendorGateway>,
    counters: Arc<dyn CpuCounters>,
    power: Arc<SpyPowerInfo>,
    gpu: GpuInfo,
) -> SensorController {
    SensorController::new(
        gateway,
        counters,
        power,
        Arc::new(FixedGpu(gpu)),
        SensorLayout::STANDARD,
    )
}

fn sample_fields(s: &SensorSample) -> [i32; 10] {
    [
        s.utilization,
        s.max_utilization,
        s.core_clock,
        s.max_core_clock,
        s.memory_clock,
        s.max_memory_clock,
        s.temperature,
        s.max_temperature,
        s.fan_speed,
        s.max_fan_speed,
    ]
}

#[tokio::test]
async fn test_no_negative_value_other_than_sentinel() {
    let controller = controller_with(
        Arc::new(DeadGateway),
        Arc::new(SpyCounters {
            broken: true,
            ..Default::default()
        }),
        Arc::new(SpyPowerInfo::new()),
        GpuInfo::EMPTY,
    );

    let data = controller.get_data().await;
    for sample in [&data.cpu, &data.gpu, &data.chipset] {
        for value in sample_fields(sample) {
            assert!(value >= -1, "negative non-sentinel value: {}", value);
            if value < 0 {
                assert_eq!(value, -1);
            }
        }
    }
}

#[tokio::test]
async fn test_utilization_within_bounds() {
    let controller = controller_with(
        Arc::new(SpyGateway::healthy()),
        Arc::new(SpyCounters::default()),
        Arc::new(SpyPowerInfo::new()),
        GpuInfo {
            utilization: 80,
            core_clock: 1500,
            max_core_clock: 2100,
            memory_clock: 2000,
            max_memory_clock: 2250,
            temperature: 70,
            max_temperature: 95,
        },
    );

    let data = controller.get_data().await;
    assert_eq!(data.cpu.utilization, 30);
    assert!(data.cpu.utilization >= 0 && data.cpu.utilization <= data.cpu.max_utilization);
    assert!(data.gpu.utilization >= 0 && data.gpu.utilization <= data.gpu.max_utilization);
}

#[tokio::test]
async fn test_cached_maxima_fetched_once() {
    let gateway = Arc::new(SpyGateway::healthy());
    let power = Arc::new(SpyPowerInfo::new());
    let controller = controller_with(
        gateway.clone(),
        Arc::new(SpyCounters::default()),
        power.clone(),
        GpuInfo::EMPTY,
    );

    for _ in 0..5 {
        let _ = controller.get_data().await;
    }

    // One max-fan-speed fetch per domain, one max-core-clock fetch, one
    // base-clock query, no matter how many polls follow.
    assert_eq!(gateway.max_fan_calls.load(Ordering::SeqCst), 3);
    assert_eq!(gateway.max_clock_calls.load(Ordering::SeqCst), 1);
    assert_eq!(power.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cpu_core_clock_from_base_and_performance() {
    let controller = controller_with(
        Arc::new(SpyGateway::healthy()),
        Arc::new(SpyCounters::default()),
        Arc::new(SpyPowerInfo::new()),
        GpuInfo::EMPTY,
    );

    let data = controller.get_data().await;
    // 2500 MHz base at 120% performance
    assert_eq!(data.cpu.core_clock, 3000);
    assert_eq!(data.cpu.max_core_clock, 5200);
}

#[tokio::test]
async fn test_gpu_fallback_uses_generic_calls_and_ceiling() {
    let controller = controller_with(
        Arc::new(SpyGateway::healthy()),
        Arc::new(SpyCounters::default()),
        Arc::new(SpyPowerInfo::new()),
        GpuInfo::EMPTY,
    );

    let data = controller.get_data().await;
    assert_eq!(data.gpu.temperature, 62);
    assert_eq!(data.gpu.max_temperature, 100);
    assert_eq!(data.gpu.utilization, -1);
    assert_eq!(data.gpu.core_clock, -1);
}

#[tokio::test]
async fn test_zero_reading_normalized_to_sentinel() {
    let gateway = SpyGateway {
        temperature_value: 0,
        fan_value: 0,
        ..Default::default()
    };
    let controller = controller_with(
        Arc::new(gateway),
        Arc::new(SpyCounters::default()),
        Arc::new(SpyPowerInfo::new()),
        GpuInfo::EMPTY,
    );

    let data = controller.get_data().await;
    assert_eq!(data.cpu.temperature, -1);
    assert_eq!(data.cpu.fan_speed, -1);
    assert_eq!(data.chipset.temperature, -1);
}

#[tokio::test]
async fn test_extended_layout_chipset_ceiling() {
    let controller = SensorController::new(
        Arc::new(SpyGateway::healthy()),
        Arc::new(SpyCounters::default()),
        Arc::new(SpyPowerInfo::new()),
        Arc::new(FixedGpu(GpuInfo::EMPTY)),
        SensorLayout::EXTENDED,
    );

    let data = controller.get_data().await;
    assert_eq!(data.chipset.max_temperature, 120);
    assert_eq!(data.cpu.max_temperature, 100);
}

#[tokio::test]
async fn test_is_supported_and_prepare() {
    let counters = Arc::new(SpyCounters::default());
    let controller = controller_with(
        Arc::new(SpyGateway::healthy()),
        counters.clone(),
        Arc::new(SpyPowerInfo::new()),
        GpuInfo::EMPTY,
    );

    assert!(controller.is_supported().await);

    let samples_before = counters.sample_calls.load(Ordering::SeqCst);
    controller.prepare().await.unwrap();
    assert_eq!(counters.reset_calls.load(Ordering::SeqCst), 1);
    // Two priming samples around the settle delay, covering the per-core
    // counters and both aggregate counters of the fallback chain.
    assert!(counters.sample_calls.load(Ordering::SeqCst) - samples_before >= 2);
    assert!(counters.idle_calls.load(Ordering::SeqCst) >= 2);
    assert!(counters.utility_calls.load(Ordering::SeqCst) >= 2);

    let lost = controller_with(
        Arc::new(DeadGateway),
        Arc::new(SpyCounters::default()),
        Arc::new(SpyPowerInfo::new()),
        GpuInfo::EMPTY,
    );
    assert!(!lost.is_supported().await);
}

#[tokio::test]
async fn test_fan_speed_table_projection() {
    let controller = controller_with(
        Arc::new(SpyGateway::healthy()),
        Arc::new(SpyCounters::default()),
        Arc::new(SpyPowerInfo::new()),
        GpuInfo::EMPTY,
    );

    let fans = controller.fan_speeds().await;
    assert_eq!(fans.cpu_fan_rpm, 3200);
    assert_eq!(fans.gpu_fan_rpm, 3200);
    assert_eq!(fans.chipset_fan_rpm, 3200);
}
