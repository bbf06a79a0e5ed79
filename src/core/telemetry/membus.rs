//! Memory-bus thermal provider.
//!
//! Discovers DIMM temperature sensors by loading a kernel-level I/O driver
//! and probing SPD thermal-sensor addresses on the SMBus. The feature is
//! strictly optional: a driver that fails to load makes this provider report
//! itself unsupported and nothing else.
//!
//! Unlike the sensor controller, this provider's "unknown" sentinel is `0`,
//! not `-1`.

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::error::Result;

/// SPD TSOD (temperature-sensor-on-DIMM) slave address range.
pub const SPD_THERMAL_ADDRESSES: RangeInclusive<u8> = 0x18..=0x1f;

/// Kernel-level I/O driver. Load/unload are synchronous ioctls.
pub trait IoDriver: Send + Sync {
    fn load(&self) -> Result<()>;

    fn unload(&self) -> Result<()>;
}

/// One DIMM thermal sensor that answered its SPD address.
#[async_trait]
pub trait SpdSensor: Send + Sync {
    async fn read_temperature(&self) -> Result<f64>;
}

#[async_trait]
pub trait SmbusController: Send + Sync {
    /// Probe one SPD slot address; `Some` if a thermal sensor answers.
    async fn probe_thermal_sensor(&self, address: u8) -> Option<Arc<dyn SpdSensor>>;
}

/// SMBus enumeration.
#[async_trait]
pub trait Smbus: Send + Sync {
    async fn controllers(&self) -> Result<Vec<Arc<dyn SmbusController>>>;
}

pub struct MemoryBusThermal {
    driver: Arc<dyn IoDriver>,
    bus: Arc<dyn Smbus>,

    init_lock: Mutex<()>,
    done: AtomicBool,
    supported: AtomicBool,
    unloaded: AtomicBool,
    sensors: RwLock<Vec<Arc<dyn SpdSensor>>>,
}

impl MemoryBusThermal {
    pub fn new(driver: Arc<dyn IoDriver>, bus: Arc<dyn Smbus>) -> Self {
        Self {
            driver,
            bus,
            init_lock: Mutex::new(()),
            done: AtomicBool::new(false),
            supported: AtomicBool::new(false),
            unloaded: AtomicBool::new(false),
            sensors: RwLock::new(Vec::new()),
        }
    }

    /// One-shot, idempotent initialization. Returns whether the provider is
    /// usable on this machine.
    pub async fn is_supported(&self) -> bool {
        if self.done.load(Ordering::Acquire) {
            return self.supported.load(Ordering::Acquire);
        }

        let _guard = self.init_lock.lock().await;
        if self.done.load(Ordering::Acquire) {
            return self.supported.load(Ordering::Acquire);
        }

        let supported = match self.initialize().await {
            Ok(()) => true,
            Err(e) => {
                log::info!("memory-bus thermal provider unavailable: {}", e);
                false
            }
        };

        self.supported.store(supported, Ordering::Release);
        self.done.store(true, Ordering::Release);
        supported
    }

    async fn initialize(&self) -> Result<()> {
        // Driver load failure is terminal for this feature only, never the
        // process.
        self.driver.load()?;

        let controllers = self.bus.controllers().await?;
        let mut discovered = Vec::new();

        for controller in controllers {
            let probes = SPD_THERMAL_ADDRESSES
                .map(|address| controller.probe_thermal_sensor(address));
            for sensor in join_all(probes).await.into_iter().flatten() {
                discovered.push(sensor);
            }
        }

        log::debug!("discovered {} DIMM thermal sensors", discovered.len());
        *self.sensors.write() = discovered;
        Ok(())
    }

    /// Highest temperature across every discovered DIMM sensor, or `0` when
    /// no sensor exists or every read failed.
    pub async fn highest_memory_temperature(&self) -> i32 {
        if !self.is_supported().await {
            return 0;
        }

        let sensors: Vec<_> = self.sensors.read().clone();
        let reads = join_all(sensors.iter().map(|s| s.read_temperature())).await;

        reads
            .into_iter()
            .filter_map(|r| r.ok())
            .map(|t| t.round() as i32)
            .max()
            .unwrap_or(0)
    }

    /// Unload the kernel driver. Called at most once; unload failures are
    /// swallowed.
    pub fn shutdown(&self) {
        if self.unloaded.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.done.load(Ordering::Acquire) && self.supported.load(Ordering::Acquire) {
            if let Err(e) = self.driver.unload() {
                log::debug!("kernel driver unload failed: {}", e);
            }
        }
    }
}

impl Drop for MemoryBusThermal {
    fn drop(&mut self) {
        self.shutdown();
    }
}
