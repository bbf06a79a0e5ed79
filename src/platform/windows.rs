//! Windows backends: WMI performance counters and the native foreground
//! window / power-information queries.

use async_trait::async_trait;
use serde::Deserialize;
use wmi::{COMLibrary, WMIConnection};

use crate::core::telemetry::cpu::{CpuCounters, PowerInfo, MAX_LOGICAL_PROCESSORS};
use crate::error::{Result, TelemetryError};

fn wmi_query<T: for<'de> Deserialize<'de> + Send + 'static>(query: &str) -> Result<Vec<T>> {
    let query = query.to_string();
    // WMI rides on COM, which is thread-affine; a fresh connection per call
    // keeps the async callers off the COM apartment entirely.
    let com = COMLibrary::new()
        .map_err(|e| TelemetryError::vendor(format!("COM init failed: {}", e)))?;
    let wmi_con = WMIConnection::new(com)
        .map_err(|e| TelemetryError::vendor(format!("Failed to connect to WMI: {}", e)))?;
    wmi_con
        .raw_query(&query)
        .map_err(|e| TelemetryError::vendor(format!("WMI query failed: {}", e)))
}

async fn wmi_query_blocking<T: for<'de> Deserialize<'de> + Send + 'static>(
    query: &'static str,
) -> Result<Vec<T>> {
    tokio::task::spawn_blocking(move || wmi_query::<T>(query))
        .await
        .map_err(|e| TelemetryError::other(format!("WMI task join failed: {}", e)))?
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct PerfOsProcessor {
    percent_processor_time: Option<u64>,
    percent_idle_time: Option<u64>,
    name: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct PerfProcessorInformation {
    percent_processor_performance: Option<u64>,
    percent_processor_utility: Option<u64>,
}

/// "% Processor Time" / "% Idle Time" / "% Processor Performance" counters
/// through the WMI formatted-data providers.
#[derive(Debug, Default)]
pub struct WmiCpuCounters;

#[async_trait]
impl CpuCounters for WmiCpuCounters {
    async fn reset(&self) -> Result<()> {
        // Formatted-data classes re-enumerate instances on every query;
        // nothing to reset.
        Ok(())
    }

    async fn per_core_usage(&self) -> Result<Vec<f64>> {
        let rows: Vec<PerfOsProcessor> = wmi_query_blocking(
            "SELECT Name, PercentProcessorTime, PercentIdleTime \
             FROM Win32_PerfFormattedData_PerfOS_Processor",
        )
        .await?;
        let cores: Vec<f64> = rows
            .iter()
            .filter(|r| r.name.as_deref() != Some("_Total"))
            .filter_map(|r| r.percent_processor_time.map(|v| v as f64))
            .collect();
        if cores.is_empty() {
            Err(TelemetryError::unsupported("no per-core counters"))
        } else {
            Ok(cores)
        }
    }

    async fn idle_percent(&self) -> Result<f64> {
        let rows: Vec<PerfOsProcessor> = wmi_query_blocking(
            "SELECT Name, PercentProcessorTime, PercentIdleTime \
             FROM Win32_PerfFormattedData_PerfOS_Processor WHERE Name = '_Total'",
        )
        .await?;
        rows.first()
            .and_then(|r| r.percent_idle_time)
            .map(|v| v as f64)
            .ok_or_else(|| TelemetryError::unsupported("no idle-time counter"))
    }

    async fn utility_percent(&self) -> Result<f64> {
        let rows: Vec<PerfProcessorInformation> = wmi_query_blocking(
            "SELECT PercentProcessorPerformance, PercentProcessorUtility \
             FROM Win32_PerfFormattedData_Counters_ProcessorInformation WHERE Name = '_Total'",
        )
        .await?;
        rows.first()
            .and_then(|r| r.percent_processor_utility)
            .map(|v| v as f64)
            .ok_or_else(|| TelemetryError::unsupported("no utility counter"))
    }

    async fn performance_percent(&self) -> Result<f64> {
        let rows: Vec<PerfProcessorInformation> = wmi_query_blocking(
            "SELECT PercentProcessorPerformance, PercentProcessorUtility \
             FROM Win32_PerfFormattedData_Counters_ProcessorInformation WHERE Name = '_Total'",
        )
        .await?;
        rows.first()
            .and_then(|r| r.percent_processor_performance)
            .map(|v| v as f64)
            .ok_or_else(|| TelemetryError::unsupported("no performance counter"))
    }
}

/// Process id owning the currently focused top-level window, if any.
pub fn foreground_window_pid() -> Option<u32> {
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        GetForegroundWindow, GetWindowThreadProcessId,
    };

    let hwnd = unsafe { GetForegroundWindow() };
    if hwnd.is_null() {
        return None;
    }
    let mut pid: u32 = 0;
    unsafe { GetWindowThreadProcessId(hwnd, &mut pid) };
    if pid == 0 {
        None
    } else {
        Some(pid)
    }
}

/// Native power-information query for per-logical-processor max clock.
#[derive(Debug, Default)]
pub struct NtPowerInfo;

impl PowerInfo for NtPowerInfo {
    fn logical_processors(&self) -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    fn base_clock_mhz(&self, processors: usize) -> Result<u32> {
        use windows_sys::Win32::System::Power::{
            CallNtPowerInformation, ProcessorInformation, PROCESSOR_POWER_INFORMATION,
        };

        let count = processors.clamp(1, MAX_LOGICAL_PROCESSORS);
        let mut buffer: Vec<PROCESSOR_POWER_INFORMATION> =
            vec![unsafe { std::mem::zeroed() }; count];

        let status = unsafe {
            CallNtPowerInformation(
                ProcessorInformation,
                std::ptr::null(),
                0,
                buffer.as_mut_ptr() as *mut _,
                (count * std::mem::size_of::<PROCESSOR_POWER_INFORMATION>()) as u32,
            )
        };

        if status != 0 {
            return Err(TelemetryError::other(format!(
                "CallNtPowerInformation failed with status {:#x}",
                status
            )));
        }

        buffer
            .iter()
            .map(|p| p.MaxMhz)
            .max()
            .filter(|&mhz| mhz > 0)
            .ok_or_else(|| TelemetryError::other("no processor power information"))
    }
}
