//! `sysinfo`-backed implementation of the hardware enumeration tree.
//!
//! Classifies the system's CPU, GPUs, memory, and storage into the gateway's
//! role-indexed device model. All devices share one refreshed `sysinfo`
//! state behind a lock; `update()` refreshes only the slice of state the
//! device reads.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sysinfo::{Components, MemoryRefreshKind, System};

use crate::core::telemetry::hwmon::{
    HardwareDevice, HardwareRole, HardwareTree, SensorKind, SensorReading,
};
use crate::error::Result;

struct Inner {
    system: System,
    components: Components,
}

/// Shared, refreshable sysinfo state.
#[derive(Clone)]
pub struct SysinfoTree {
    inner: Arc<Mutex<Inner>>,
}

impl SysinfoTree {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        system.refresh_memory();
        let components = Components::new_with_refreshed_list();
        Self {
            inner: Arc::new(Mutex::new(Inner { system, components })),
        }
    }

    fn enumerate(&self) -> Vec<Arc<dyn HardwareDevice>> {
        let mut devices: Vec<Arc<dyn HardwareDevice>> = vec![
            Arc::new(CpuDevice {
                inner: self.inner.clone(),
            }),
            Arc::new(MemoryDevice {
                inner: self.inner.clone(),
            }),
        ];

        let inner = self.inner.lock();
        for component in inner.components.iter() {
            let label = component.label().to_lowercase();
            let role = if label.contains("nvidia") {
                Some(HardwareRole::GpuNvidia)
            } else if label.contains("amdgpu") || label.contains("radeon") {
                Some(HardwareRole::GpuAmd)
            } else if label.contains("nvme") || label.contains("ssd") || label.contains("disk") {
                Some(HardwareRole::Storage)
            } else {
                None
            };
            if let Some(role) = role {
                devices.push(Arc::new(ComponentDevice {
                    inner: self.inner.clone(),
                    label: component.label().to_string(),
                    role,
                }));
            }
        }

        devices
    }
}

impl Default for SysinfoTree {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HardwareTree for SysinfoTree {
    async fn open(&self) -> Result<Vec<Arc<dyn HardwareDevice>>> {
        Ok(self.enumerate())
    }

    async fn reopen(&self) -> Result<Vec<Arc<dyn HardwareDevice>>> {
        {
            let mut inner = self.inner.lock();
            inner.components = Components::new_with_refreshed_list();
        }
        Ok(self.enumerate())
    }
}

struct CpuDevice {
    inner: Arc<Mutex<Inner>>,
}

impl HardwareDevice for CpuDevice {
    fn name(&self) -> String {
        let inner = self.inner.lock();
        inner
            .system
            .cpus()
            .first()
            .map(|c| c.brand().to_string())
            .unwrap_or_default()
    }

    fn role(&self) -> HardwareRole {
        HardwareRole::Cpu
    }

    fn update(&self) -> Result<()> {
        self.inner.lock().system.refresh_cpu_all();
        Ok(())
    }

    fn sensors(&self, kind: SensorKind) -> Vec<SensorReading> {
        match kind {
            SensorKind::Load => {
                let inner = self.inner.lock();
                vec![SensorReading {
                    name: "CPU Total".to_string(),
                    value: inner.system.global_cpu_usage(),
                }]
            }
            // sysinfo exposes no CPU package power or temperature here;
            // those arrive through the component list on machines that
            // report them.
            _ => Vec::new(),
        }
    }
}

struct MemoryDevice {
    inner: Arc<Mutex<Inner>>,
}

impl HardwareDevice for MemoryDevice {
    fn name(&self) -> String {
        "Memory".to_string()
    }

    fn role(&self) -> HardwareRole {
        HardwareRole::Memory
    }

    fn update(&self) -> Result<()> {
        self.inner
            .lock()
            .system
            .refresh_memory_specifics(MemoryRefreshKind::everything());
        Ok(())
    }

    fn sensors(&self, kind: SensorKind) -> Vec<SensorReading> {
        match kind {
            SensorKind::Load => {
                let inner = self.inner.lock();
                let total = inner.system.total_memory();
                let used = inner.system.used_memory();
                let percent = if total > 0 {
                    (used as f32 / total as f32) * 100.0
                } else {
                    0.0
                };
                vec![SensorReading {
                    name: "Memory".to_string(),
                    value: percent,
                }]
            }
            _ => Vec::new(),
        }
    }
}

struct ComponentDevice {
    inner: Arc<Mutex<Inner>>,
    label: String,
    role: HardwareRole,
}

impl HardwareDevice for ComponentDevice {
    fn name(&self) -> String {
        self.label.clone()
    }

    fn role(&self) -> HardwareRole {
        self.role
    }

    fn update(&self) -> Result<()> {
        self.inner.lock().components.refresh(true);
        Ok(())
    }

    fn sensors(&self, kind: SensorKind) -> Vec<SensorReading> {
        if kind != SensorKind::Temperature {
            return Vec::new();
        }
        let inner = self.inner.lock();
        inner
            .components
            .iter()
            .filter(|c| c.label() == self.label)
            .filter_map(|c| {
                c.temperature().map(|t| SensorReading {
                    name: self.label.clone(),
                    value: t,
                })
            })
            .collect()
    }
}
