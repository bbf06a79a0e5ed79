use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use hwpulse::core::config::Config;
use hwpulse::core::telemetry::hwmon::{
    HardwareDevice, HardwareMonitor, HardwareRole, HardwareTree, SensorKind, SensorReading,
};
use hwpulse::core::telemetry::power_state::{GpuPowerState, HybridGpuPower};
use hwpulse::error::{Result, TelemetryError};

struct FakeDevice {
    name: String,
    role: HardwareRole,
    update_count: Arc<AtomicUsize>,
    power: Vec<f32>,
    temperature: Vec<SensorReading>,
    load: Vec<f32>,
}

impl FakeDevice {
    fn new(name: &str, role: HardwareRole) -> Self {
        Self {
            name: name.to_string(),
            role,
            update_count: Arc::new(AtomicUsize::new(0)),
            power: Vec::new(),
            temperature: Vec::new(),
            load: Vec::new(),
        }
    }

    fn with_power(mut self, watts: f32) -> Self {
        self.power.push(watts);
        self
    }

    fn with_temperature(mut self, name: &str, value: f32) -> Self {
        self.temperature.push(SensorReading {
            name: name.to_string(),
            value,
        });
        self
    }
}

impl HardwareDevice for FakeDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn role(&self) -> HardwareRole {
        self.role
    }

    fn update(&self) -> Result<()> {
        self.update_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn sensors(&self, kind: SensorKind) -> Vec<SensorReading> {
        match kind {
            SensorKind::Power => self
                .power
                .iter()
                .map(|&value| SensorReading {
                    name: "Package".to_string(),
                    value,
                })
                .collect(),
            SensorKind::Temperature => self.temperature.clone(),
            SensorKind::Load => self
                .load
                .iter()
                .map(|&value| SensorReading {
                    name: "Memory".to_string(),
                    value,
                })
                .collect(),
        }
    }
}

struct FakeTree {
    open_count: AtomicUsize,
    reopen_count: AtomicUsize,
    fail_with_native_dependency: bool,
    devices: Mutex<Vec<Arc<dyn HardwareDevice>>>,
    reopen_devices: Mutex<Vec<Arc<dyn HardwareDevice>>>,
}

impl FakeTree {
    fn new(devices: Vec<Arc<dyn HardwareDevice>>) -> Self {
        Self {
            open_count: AtomicUsize::new(0),
            reopen_count: AtomicUsize::new(0),
            fail_with_native_dependency: false,
            devices: Mutex::new(devices),
            reopen_devices: Mutex::new(Vec::new()),
        }
    }

    fn broken() -> Self {
        Self {
            fail_with_native_dependency: true,
            ..Self::new(Vec::new())
        }
    }
}

#[async_trait]
impl HardwareTree for FakeTree {
    async fn open(&self) -> Result<Vec<Arc<dyn HardwareDevice>>> {
        // Widen the race window for the concurrent-callers test.
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.open_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_with_native_dependency {
            return Err(TelemetryError::native_dependency("driver not installed"));
        }
        Ok(self.devices.lock().clone())
    }

    async fn reopen(&self) -> Result<Vec<Arc<dyn HardwareDevice>>> {
        self.reopen_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.reopen_devices.lock().clone())
    }
}

struct SwitchablePower(Mutex<GpuPowerState>);

impl SwitchablePower {
    fn new(state: GpuPowerState) -> Arc<Self> {
        Arc::new(Self(Mutex::new(state)))
    }

    fn set(&self, state: GpuPowerState) {
        *self.0.lock() = state;
    }
}

#[async_trait]
impl HybridGpuPower for SwitchablePower {
    fn is_supported(&self) -> bool {
        true
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn last_known_state(&self) -> GpuPowerState {
        *self.0.lock()
    }
}

fn monitor_with(
    tree: Arc<FakeTree>,
    power: Arc<SwitchablePower>,
) -> Arc<HardwareMonitor> {
    Arc::new(HardwareMonitor::new(tree, power, None))
}

#[tokio::test]
async fn test_concurrent_callers_initialize_once() {
    let tree = Arc::new(FakeTree::new(vec![Arc::new(
        FakeDevice::new("AMD Ryzen 9 7940HS with Radeon Graphics", HardwareRole::Cpu)
            .with_power(54.3),
    )]));
    let monitor = monitor_with(tree.clone(), SwitchablePower::new(GpuPowerState::Active));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let monitor = monitor.clone();
        tasks.push(tokio::spawn(async move { monitor.is_supported().await }));
    }
    for task in tasks {
        assert!(task.await.unwrap());
    }

    assert_eq!(tree.open_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cpu_accessors_strip_marketing_name() {
    let tree = Arc::new(FakeTree::new(vec![Arc::new(
        FakeDevice::new("AMD Ryzen 9 7940HS with Radeon Graphics", HardwareRole::Cpu)
            .with_power(54.3),
    )]));
    let monitor = monitor_with(tree, SwitchablePower::new(GpuPowerState::Active));

    assert_eq!(monitor.cpu_name().await, "Ryzen 9 7940HS");
    assert_eq!(monitor.cpu_power_watts().await, 54);
}

#[tokio::test]
async fn test_gpu_name_strips_vendor_and_suffix() {
    let tree = Arc::new(FakeTree::new(vec![Arc::new(
        FakeDevice::new("NVIDIA GeForce RTX 4070 Laptop GPU", HardwareRole::GpuNvidia)
            .with_power(31.0),
    )]));
    let monitor = monitor_with(tree, SwitchablePower::new(GpuPowerState::Active));

    assert_eq!(monitor.gpu_name().await, "GeForce RTX 4070");
}

#[tokio::test]
async fn test_gpu_power_suppressed_while_unusable() {
    let gpu = FakeDevice::new("NVIDIA GeForce RTX 4070", HardwareRole::GpuNvidia)
        .with_power(45.0);
    let updates = gpu.update_count.clone();
    let tree = Arc::new(FakeTree::new(vec![Arc::new(gpu)]));
    let power = SwitchablePower::new(GpuPowerState::Inactive);
    let monitor = monitor_with(tree, power.clone());

    // No previous reading and an unusable GPU: no query is made at all.
    assert_eq!(monitor.gpu_power_watts().await, -1);
    assert_eq!(updates.load(Ordering::SeqCst), 0);

    // Once usable, the reading flows through and is remembered.
    power.set(GpuPowerState::Active);
    assert_eq!(monitor.gpu_power_watts().await, 45);
    assert_eq!(updates.load(Ordering::SeqCst), 1);

    // A significant last reading overrides the unusable state.
    power.set(GpuPowerState::Inactive);
    assert_eq!(monitor.gpu_power_watts().await, 45);
    assert_eq!(updates.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_vram_temperature_picks_junction_sensor() {
    let tree = Arc::new(FakeTree::new(vec![Arc::new(
        FakeDevice::new("NVIDIA GeForce RTX 4070", HardwareRole::GpuNvidia)
            .with_temperature("GPU Core", 62.0)
            .with_temperature("GPU Memory Junction", 74.4),
    )]));
    let monitor = monitor_with(tree, SwitchablePower::new(GpuPowerState::Active));

    assert_eq!(monitor.gpu_vram_temperature().await, 74);
}

#[tokio::test]
async fn test_ssd_temperatures_cover_zero_one_and_many_disks() {
    let power = SwitchablePower::new(GpuPowerState::Active);

    let none = monitor_with(Arc::new(FakeTree::new(Vec::new())), power.clone());
    assert_eq!(none.ssd_temperatures().await, (0, 0));

    let one = monitor_with(
        Arc::new(FakeTree::new(vec![Arc::new(
            FakeDevice::new("Samsung SSD 990 PRO", HardwareRole::Storage)
                .with_temperature("Temperature", 41.0),
        )])),
        power.clone(),
    );
    assert_eq!(one.ssd_temperatures().await, (41, 0));

    // Three disks, one without a positive temperature: only the first two
    // qualifying readings are reported.
    let many = monitor_with(
        Arc::new(FakeTree::new(vec![
            Arc::new(
                FakeDevice::new("Disk A", HardwareRole::Storage)
                    .with_temperature("Temperature", 41.0),
            ),
            Arc::new(
                FakeDevice::new("Disk B", HardwareRole::Storage)
                    .with_temperature("Temperature", 0.0),
            ),
            Arc::new(
                FakeDevice::new("Disk C", HardwareRole::Storage)
                    .with_temperature("Temperature", 38.0),
            ),
        ])),
        power,
    );
    assert_eq!(many.ssd_temperatures().await, (41, 38));
}

#[tokio::test]
async fn test_missing_native_dependency_disables_permanently() {
    let tree = Arc::new(FakeTree::broken());
    let monitor = monitor_with(tree.clone(), SwitchablePower::new(GpuPowerState::Active));

    assert!(!monitor.is_supported().await);
    assert!(!monitor.is_supported().await);
    // The probe ran once; later calls short-circuit.
    assert_eq!(tree.open_count.load(Ordering::SeqCst), 1);

    assert_eq!(monitor.cpu_name().await, "UNKNOWN");
    assert_eq!(monitor.cpu_power_watts().await, -1);
}

#[tokio::test]
async fn test_persisted_disablement_skips_probe() {
    let tree = Arc::new(FakeTree::new(vec![Arc::new(
        FakeDevice::new("AMD Ryzen 9 7940HS with Radeon Graphics", HardwareRole::Cpu)
            .with_power(54.3),
    )]));
    let settings = Arc::new(Mutex::new(Config {
        hardware_monitor_enabled: false,
        ..Default::default()
    }));
    let monitor = Arc::new(HardwareMonitor::new(
        tree.clone(),
        SwitchablePower::new(GpuPowerState::Active),
        Some(settings),
    ));

    // A session that persisted the disablement never re-probes the tree.
    assert!(!monitor.is_supported().await);
    assert_eq!(tree.open_count.load(Ordering::SeqCst), 0);

    assert_eq!(monitor.cpu_power_watts().await, -1);
    assert_eq!(monitor.cpu_name().await, "UNKNOWN");
    assert_eq!(tree.open_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_gpu_changed_reresolves_only_nvidia_entry() {
    let old_cpu = FakeDevice::new("Intel(R) Core(TM) i7-14700K", HardwareRole::Cpu);
    let cpu_updates = old_cpu.update_count.clone();

    let tree = Arc::new(FakeTree::new(vec![
        Arc::new(old_cpu),
        Arc::new(FakeDevice::new(
            "NVIDIA GeForce RTX 3060",
            HardwareRole::GpuNvidia,
        )),
    ]));
    *tree.reopen_devices.lock() = vec![
        Arc::new(FakeDevice::new("Some Other CPU", HardwareRole::Cpu)),
        Arc::new(FakeDevice::new(
            "NVIDIA GeForce RTX 4070",
            HardwareRole::GpuNvidia,
        )),
    ];
    let monitor = monitor_with(tree.clone(), SwitchablePower::new(GpuPowerState::Active));

    assert_eq!(monitor.gpu_name().await, "GeForce RTX 3060");
    monitor.notify_gpu_changed().await;
    assert_eq!(tree.reopen_count.load(Ordering::SeqCst), 1);

    // GPU reference replaced, CPU reference untouched.
    assert_eq!(monitor.gpu_name().await, "GeForce RTX 4070");
    assert_eq!(monitor.cpu_name().await, "Intel Core i7-14700K");
    assert!(cpu_updates.load(Ordering::SeqCst) >= 1);
}
