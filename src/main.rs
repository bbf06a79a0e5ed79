use std::sync::Arc;

use anyhow::Result;
use clap::{Arg, ArgAction, Command};

use hwpulse::core::blacklist::ProcessBlacklist;
use hwpulse::core::telemetry::{
    FpsMonitor, GpuSource, HardwareMonitor, PollIntervals, SensorController, SensorLayout,
    TelemetryRuntime,
};
use hwpulse::platform;
use hwpulse::platform::fallback::{
    NullVendorGateway, SysinfoForegroundQuery, UnsupportedFrameInspector,
};
use hwpulse::platform::tree::SysinfoTree;
use hwpulse::Config;

#[cfg(not(feature = "nvml"))]
struct NoGpu;

#[cfg(not(feature = "nvml"))]
#[async_trait::async_trait]
impl GpuSource for NoGpu {
    async fn read(&self) -> hwpulse::core::telemetry::GpuInfo {
        hwpulse::core::telemetry::GpuInfo::EMPTY
    }
}

fn gpu_source() -> Arc<dyn GpuSource> {
    #[cfg(feature = "nvml")]
    {
        use hwpulse::core::telemetry::power_state::AlwaysActiveGpu;
        use hwpulse::core::telemetry::GpuTelemetry;
        use hwpulse::platform::nvml::NvmlGpuDriver;
        Arc::new(GpuTelemetry::new(NvmlGpuDriver::new(), AlwaysActiveGpu))
    }
    #[cfg(not(feature = "nvml"))]
    {
        Arc::new(NoGpu)
    }
}

fn main() -> Result<()> {
    hwpulse::init_logging();

    let matches = Command::new("hwpulse")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Live hardware telemetry snapshots")
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval")
                .value_name("SECONDS")
                .help("Poll interval in seconds (overrides the configured interval)"),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .help("Print a single snapshot and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Emit snapshots as JSON")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let interval_secs: Option<u64> = matches
        .get_one::<String>("interval")
        .and_then(|s| s.parse().ok());
    let once = matches.get_flag("once");
    let json = matches.get_flag("json");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .thread_name("telemetry-worker")
        .build()?;

    runtime.block_on(run(interval_secs, once, json))
}

async fn run(interval_secs: Option<u64>, once: bool, json: bool) -> Result<()> {
    let config = Config::load().unwrap_or_default();

    let intervals = PollIntervals {
        sensors: interval_secs
            .map(std::time::Duration::from_secs)
            .unwrap_or_else(|| std::time::Duration::from_millis(config.sensor_poll_interval_ms)),
        fps: std::time::Duration::from_millis(config.fps_poll_interval_ms),
    };
    let blacklist = ProcessBlacklist::from_names(&config.fps_process_blacklist);
    let settings = Arc::new(parking_lot::Mutex::new(config));

    let controller = Arc::new(SensorController::new(
        Arc::new(NullVendorGateway),
        platform::cpu_counters(),
        platform::power_info(),
        gpu_source(),
        SensorLayout::STANDARD,
    ));

    let monitor = HardwareMonitor::new(
        Arc::new(SysinfoTree::new()),
        Arc::new(hwpulse::core::telemetry::power_state::AlwaysActiveGpu),
        Some(settings),
    );

    let fps = Arc::new(FpsMonitor::new(
        Arc::new(SysinfoForegroundQuery::new()),
        Arc::new(UnsupportedFrameInspector),
        blacklist,
    ));
    let _runtime_handle = TelemetryRuntime::spawn(controller.clone(), fps.clone(), intervals);

    use hwpulse::core::telemetry::SensorsSource;
    loop {
        tokio::time::sleep(intervals.sensors).await;

        let data = controller.get_data().await;
        let (ssd1, ssd2) = monitor.ssd_temperatures().await;

        if json {
            println!("{}", serde_json::to_string(&data)?);
        } else {
            println!(
                "[{}] CPU: {}% @ {} MHz, {}°C | GPU: {}% {}°C | chipset {}°C | SSD {}/{}°C | mem {}% | fps {}",
                chrono::Local::now().format("%H:%M:%S"),
                data.cpu.utilization,
                data.cpu.core_clock,
                data.cpu.temperature,
                data.gpu.utilization,
                data.gpu.temperature,
                data.chipset.temperature,
                ssd1,
                ssd2,
                monitor.memory_usage_percent().await,
                fps.latest().fps,
            );
        }

        if once {
            break;
        }
    }

    Ok(())
}
