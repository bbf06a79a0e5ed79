//! NVML-backed GPU driver query implementation.

use nvml_wrapper::enum_wrappers::device::{
    Clock, TemperatureSensor, TemperatureThreshold,
};
use nvml_wrapper::{Device, Nvml};
use once_cell::sync::Lazy;

use crate::core::telemetry::gpu::{
    GpuClocks, GpuDriver, GpuThermal, GpuUtilization, MemoryBusKind,
};
use crate::error::{Result, TelemetryError};

/// Singleton - NVML must be initialized ONCE only
static NVML: Lazy<Option<Nvml>> = Lazy::new(|| Nvml::init().ok());

/// Fallback ceiling when the driver exposes no GPU-max threshold.
const DEFAULT_MAX_TEMPERATURE: i32 = 100;

pub struct NvmlGpuDriver {
    device_index: u32,
}

impl NvmlGpuDriver {
    /// Driver scoped to the first physical GPU.
    pub fn new() -> Self {
        Self { device_index: 0 }
    }

    fn device(&self) -> Result<Device<'static>> {
        let nvml = NVML.as_ref().ok_or_else(|| {
            TelemetryError::gpu_not_available(
                "NVML not available (NVIDIA driver not installed or incompatible)",
            )
        })?;
        nvml.device_by_index(self.device_index).map_err(|e| {
            TelemetryError::gpu_not_available(format!(
                "Failed to get NVIDIA device {}: {}",
                self.device_index, e
            ))
        })
    }
}

impl Default for NvmlGpuDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuDriver for NvmlGpuDriver {
    fn initialize(&self) -> Result<()> {
        // Lazy init is idempotent; this only validates it succeeded.
        if NVML.is_some() {
            Ok(())
        } else {
            Err(TelemetryError::gpu_not_available("NVML init failed"))
        }
    }

    fn utilization(&self) -> Result<GpuUtilization> {
        let device = self.device()?;
        let rates = device
            .utilization_rates()
            .map_err(|e| TelemetryError::metric_collection(format!("utilization: {}", e)))?;
        // Video-engine load is best-effort; not every GPU reports it.
        let video = device
            .encoder_utilization()
            .map(|u| u.utilization)
            .unwrap_or(0);
        Ok(GpuUtilization {
            graphics: rates.gpu,
            video,
        })
    }

    fn clocks(&self) -> Result<GpuClocks> {
        let device = self.device()?;
        let core_mhz = device
            .clock_info(Clock::Graphics)
            .map_err(|e| TelemetryError::metric_collection(format!("core clock: {}", e)))?;
        let core_boost_mhz = device
            .max_clock_info(Clock::Graphics)
            .map_err(|e| TelemetryError::metric_collection(format!("boost clock: {}", e)))?;
        let memory_mhz = device
            .clock_info(Clock::Memory)
            .map_err(|e| TelemetryError::metric_collection(format!("memory clock: {}", e)))?;
        let memory_boost_mhz = device
            .max_clock_info(Clock::Memory)
            .map_err(|e| TelemetryError::metric_collection(format!("memory boost: {}", e)))?;
        Ok(GpuClocks {
            core_mhz,
            core_boost_mhz,
            memory_mhz,
            memory_boost_mhz,
        })
    }

    fn thermal(&self) -> Result<GpuThermal> {
        let device = self.device()?;
        let current = device
            .temperature(TemperatureSensor::Gpu)
            .map_err(|e| TelemetryError::metric_collection(format!("temperature: {}", e)))?;
        let default_max = device
            .temperature_threshold(TemperatureThreshold::GpuMax)
            .map(|t| t as i32)
            .unwrap_or(DEFAULT_MAX_TEMPERATURE);
        Ok(GpuThermal {
            current: current as i32,
            default_max,
        })
    }

    fn memory_kind(&self) -> Result<MemoryBusKind> {
        let device = self.device()?;
        let bus_width = device
            .memory_bus_width()
            .map_err(|e| TelemetryError::metric_collection(format!("bus width: {}", e)))?;
        let mem_clock = device
            .max_clock_info(Clock::Memory)
            .map_err(|e| TelemetryError::metric_collection(format!("memory clock: {}", e)))?;

        // The driver does not name the memory technology; infer it from the
        // effective per-pin transfer rate (DDR = double data rate).
        let effective_rate = mem_clock * 2;
        let kind = if effective_rate > 26000 {
            MemoryBusKind::Gddr7
        } else if effective_rate > 18000 && bus_width >= 256 {
            MemoryBusKind::Gddr6x
        } else if effective_rate > 12000 {
            MemoryBusKind::Gddr6
        } else if effective_rate > 8000 {
            MemoryBusKind::Gddr5x
        } else if effective_rate > 4000 {
            MemoryBusKind::Gddr5
        } else {
            MemoryBusKind::Unknown
        };
        Ok(kind)
    }

    fn boost_offset_mhz(&self) -> Result<i32> {
        let device = self.device()?;
        // Not every driver generation exposes the VF offset; treat absence
        // as a zero offset rather than blanking the whole reading.
        Ok(device.gpc_clock_vf_offset().unwrap_or(0))
    }
}
