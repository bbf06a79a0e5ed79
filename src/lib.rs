// hwpulse Library - Public API

// Re-export error types
pub mod error;
pub use error::{Result, TelemetryError};

// Module declarations
pub mod core;
pub mod platform;

// Re-export commonly used types
pub use core::config::Config;
pub use core::telemetry::{FanSpeedTable, FpsData, SensorSample, SensorsData};

// Initialize logging
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
