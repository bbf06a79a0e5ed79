//! Hardware-monitor gateway.
//!
//! Adapts a whole-system hardware enumeration library into narrow,
//! single-purpose async accessors. The library's `open()` is expensive and
//! not safe to invoke twice concurrently, so initialization happens exactly
//! once behind a mutex with a double-checked done flag; discovered device
//! handles live in a role-indexed arena for process lifetime, except the
//! NVIDIA GPU entry which can be invalidated and re-resolved on hot-plug.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex as SyncMutex, RwLock};
use tokio::sync::Mutex;

use super::names::strip_name;
use super::power_state::HybridGpuPower;
use crate::core::config::Config;
use crate::error::{Result, TelemetryError};

/// Stable logical role of a discovered hardware object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareRole {
    Cpu,
    GpuNvidia,
    GpuAmd,
    Memory,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Power,
    Temperature,
    Load,
}

#[derive(Debug, Clone)]
pub struct SensorReading {
    pub name: String,
    pub value: f32,
}

/// One hardware object in the enumeration library's tree.
pub trait HardwareDevice: Send + Sync {
    fn name(&self) -> String;

    fn role(&self) -> HardwareRole;

    /// Re-query this object's sensors. The library requires an explicit
    /// update per poll; reading without one returns stale values.
    fn update(&self) -> Result<()>;

    fn sensors(&self, kind: SensorKind) -> Vec<SensorReading>;
}

/// The enumeration library itself.
#[async_trait]
pub trait HardwareTree: Send + Sync {
    /// Open the hardware tree and enumerate devices. Not safe to call twice
    /// concurrently. A [`TelemetryError::NativeDependency`] here means the
    /// library's native dependency is absent on this machine.
    async fn open(&self) -> Result<Vec<Arc<dyn HardwareDevice>>>;

    /// Reset the tree and enumerate again, after a GPU hot-plug.
    async fn reopen(&self) -> Result<Vec<Arc<dyn HardwareDevice>>>;
}

#[derive(Default)]
struct Arena {
    cpu: Option<Arc<dyn HardwareDevice>>,
    gpu_nvidia: Option<Arc<dyn HardwareDevice>>,
    gpu_amd: Option<Arc<dyn HardwareDevice>>,
    memory: Option<Arc<dyn HardwareDevice>>,
    storage: Vec<Arc<dyn HardwareDevice>>,
}

impl Arena {
    fn index(devices: Vec<Arc<dyn HardwareDevice>>) -> Self {
        let mut arena = Arena::default();
        for device in devices {
            match device.role() {
                HardwareRole::Cpu => {
                    arena.cpu.get_or_insert(device);
                }
                HardwareRole::GpuNvidia => {
                    arena.gpu_nvidia.get_or_insert(device);
                }
                HardwareRole::GpuAmd => {
                    arena.gpu_amd.get_or_insert(device);
                }
                HardwareRole::Memory => {
                    arena.memory.get_or_insert(device);
                }
                HardwareRole::Storage => arena.storage.push(device),
            }
        }
        arena
    }
}

/// Previous-reading threshold below which a GPU power query is skipped while
/// the power controller reports the GPU unusable. Heuristic, not a
/// correctness requirement: it assumes draw does not jump from near-zero to
/// significant between consecutive polls.
const GPU_POWER_SUPPRESS_THRESHOLD: i32 = 10;

pub struct HardwareMonitor {
    tree: Arc<dyn HardwareTree>,
    power: Arc<dyn HybridGpuPower>,
    settings: Option<Arc<SyncMutex<Config>>>,

    init_lock: Mutex<()>,
    done: AtomicBool,
    supported: AtomicBool,
    arena: RwLock<Arena>,
    last_gpu_power: AtomicI32,
}

impl HardwareMonitor {
    pub fn new(
        tree: Arc<dyn HardwareTree>,
        power: Arc<dyn HybridGpuPower>,
        settings: Option<Arc<SyncMutex<Config>>>,
    ) -> Self {
        Self {
            tree,
            power,
            settings,
            init_lock: Mutex::new(()),
            done: AtomicBool::new(false),
            supported: AtomicBool::new(false),
            arena: RwLock::new(Arena::default()),
            last_gpu_power: AtomicI32::new(-1),
        }
    }

    /// Confirm support, performing the one-shot initialization if needed.
    ///
    /// Concurrent first callers all block on one real initialization; after
    /// the first success or permanent failure everyone short-circuits on the
    /// done flag.
    pub async fn is_supported(&self) -> bool {
        if self.done.load(Ordering::Acquire) {
            return self.supported.load(Ordering::Acquire);
        }

        let _guard = self.init_lock.lock().await;
        if self.done.load(Ordering::Acquire) {
            return self.supported.load(Ordering::Acquire);
        }

        // A previous session already found the native dependency missing and
        // persisted the disablement; skip the expensive probe entirely.
        if self.disabled_by_setting() {
            log::info!("hardware monitor disabled by persisted setting");
            self.supported.store(false, Ordering::Release);
            self.done.store(true, Ordering::Release);
            return false;
        }

        let supported = match self.tree.open().await {
            Ok(devices) => {
                *self.arena.write() = Arena::index(devices);
                true
            }
            Err(TelemetryError::NativeDependency(msg)) => {
                log::warn!("hardware monitor native dependency missing: {}", msg);
                self.disable_setting();
                false
            }
            Err(e) => {
                log::warn!("hardware monitor initialization failed: {}", e);
                false
            }
        };

        self.supported.store(supported, Ordering::Release);
        self.done.store(true, Ordering::Release);
        supported
    }

    fn disabled_by_setting(&self) -> bool {
        self.settings
            .as_ref()
            .is_some_and(|settings| !settings.lock().hardware_monitor_enabled)
    }

    /// Persist the disablement so future sessions skip the expensive probe.
    fn disable_setting(&self) {
        if let Some(settings) = &self.settings {
            let mut config = settings.lock();
            if let Err(e) = config.disable_hardware_monitor() {
                log::warn!("failed to persist hardware monitor disablement: {}", e);
            }
        }
    }

    /// Re-resolve the NVIDIA GPU reference after a hot-plug/power-cycle.
    /// All other cached hardware references are left untouched.
    pub async fn notify_gpu_changed(&self) {
        if !self.is_supported().await {
            return;
        }

        match self.tree.reopen().await {
            Ok(devices) => {
                let nvidia = devices
                    .into_iter()
                    .find(|d| d.role() == HardwareRole::GpuNvidia);
                self.arena.write().gpu_nvidia = nvidia;
            }
            Err(e) => log::warn!("GPU re-enumeration failed: {}", e),
        }
    }

    fn device(&self, role: HardwareRole) -> Option<Arc<dyn HardwareDevice>> {
        let arena = self.arena.read();
        match role {
            HardwareRole::Cpu => arena.cpu.clone(),
            HardwareRole::GpuNvidia => arena.gpu_nvidia.clone(),
            HardwareRole::GpuAmd => arena.gpu_amd.clone(),
            HardwareRole::Memory => arena.memory.clone(),
            HardwareRole::Storage => arena.storage.first().cloned(),
        }
    }

    async fn updated_device(&self, role: HardwareRole) -> Option<Arc<dyn HardwareDevice>> {
        if !self.is_supported().await {
            return None;
        }
        let device = self.device(role)?;
        if let Err(e) = device.update() {
            log::debug!("hardware update failed for {:?}: {}", role, e);
            return None;
        }
        Some(device)
    }

    fn first_sensor(device: &Arc<dyn HardwareDevice>, kind: SensorKind) -> Option<f32> {
        device.sensors(kind).first().map(|s| s.value)
    }

    pub async fn cpu_name(&self) -> String {
        match self.updated_device(HardwareRole::Cpu).await {
            Some(device) => strip_name(&device.name()),
            None => super::names::UNKNOWN_NAME.to_string(),
        }
    }

    pub async fn cpu_power_watts(&self) -> i32 {
        match self.updated_device(HardwareRole::Cpu).await {
            Some(device) => Self::first_sensor(&device, SensorKind::Power)
                .map(|v| v.round() as i32)
                .unwrap_or(-1),
            None => -1,
        }
    }

    pub async fn gpu_name(&self) -> String {
        match self.updated_device(HardwareRole::GpuNvidia).await {
            Some(device) => strip_name(&device.name()),
            None => super::names::UNKNOWN_NAME.to_string(),
        }
    }

    pub async fn gpu_power_watts(&self) -> i32 {
        // When the last reading was near zero and the controller says the
        // GPU is not usable, skip the query entirely: a powered-off device
        // would only cost us a spurious driver call.
        let last = self.last_gpu_power.load(Ordering::Relaxed);
        if last <= GPU_POWER_SUPPRESS_THRESHOLD
            && !self.power.last_known_state().await.is_queryable()
        {
            return -1;
        }

        let value = match self.updated_device(HardwareRole::GpuNvidia).await {
            Some(device) => Self::first_sensor(&device, SensorKind::Power)
                .map(|v| v.round() as i32)
                .unwrap_or(-1),
            None => -1,
        };
        self.last_gpu_power.store(value, Ordering::Relaxed);
        value
    }

    /// VRAM junction temperature of the discrete GPU, or `-1`.
    pub async fn gpu_vram_temperature(&self) -> i32 {
        match self.updated_device(HardwareRole::GpuNvidia).await {
            Some(device) => device
                .sensors(SensorKind::Temperature)
                .iter()
                .find(|s| {
                    let name = s.name.to_lowercase();
                    name.contains("junction") || name.contains("memory")
                })
                .map(|s| s.value.round() as i32)
                .unwrap_or(-1),
            None => -1,
        }
    }

    /// Temperatures of the first two storage devices reporting a positive
    /// temperature sensor; missing slots are `0`.
    pub async fn ssd_temperatures(&self) -> (i32, i32) {
        if !self.is_supported().await {
            return (0, 0);
        }

        let storage: Vec<_> = self.arena.read().storage.clone();
        let mut found = [0i32; 2];
        let mut count = 0;

        for device in storage {
            if count == found.len() {
                break;
            }
            if let Err(e) = device.update() {
                log::debug!("storage update failed: {}", e);
                continue;
            }
            let temp = device
                .sensors(SensorKind::Temperature)
                .iter()
                .map(|s| s.value.round() as i32)
                .find(|&v| v > 0);
            if let Some(v) = temp {
                found[count] = v;
                count += 1;
            }
        }

        (found[0], found[1])
    }

    pub async fn memory_usage_percent(&self) -> i32 {
        match self.updated_device(HardwareRole::Memory).await {
            Some(device) => Self::first_sensor(&device, SensorKind::Load)
                .map(|v| v.round() as i32)
                .unwrap_or(-1),
            None => -1,
        }
    }

    pub async fn memory_temperature(&self) -> i32 {
        match self.updated_device(HardwareRole::Memory).await {
            Some(device) => Self::first_sensor(&device, SensorKind::Temperature)
                .map(|v| v.round() as i32)
                .unwrap_or(-1),
            None => -1,
        }
    }
}
