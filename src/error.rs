use std::io;
use thiserror::Error;

/// Custom error type for the telemetry engine
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Feature unsupported: {0}")]
    Unsupported(String),

    #[error("Vendor interface error: {0}")]
    Vendor(String),

    #[error("Native dependency missing: {0}")]
    NativeDependency(String),

    #[error("GPU not available: {0}")]
    GpuNotAvailable(String),

    #[error("Metric collection failed: {0}")]
    MetricCollection(String),

    #[error("Frame inspection error: {0}")]
    FrameInspection(String),

    #[error("Kernel driver error: {0}")]
    KernelDriver(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for the telemetry engine
pub type Result<T> = std::result::Result<T, TelemetryError>;

impl TelemetryError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        TelemetryError::Config(msg.into())
    }

    /// Create an unsupported-feature error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        TelemetryError::Unsupported(msg.into())
    }

    /// Create a vendor interface error
    pub fn vendor<S: Into<String>>(msg: S) -> Self {
        TelemetryError::Vendor(msg.into())
    }

    /// Create a native dependency error
    pub fn native_dependency<S: Into<String>>(msg: S) -> Self {
        TelemetryError::NativeDependency(msg.into())
    }

    pub fn gpu_not_available<S: Into<String>>(msg: S) -> Self {
        TelemetryError::GpuNotAvailable(msg.into())
    }

    pub fn metric_collection<S: Into<String>>(msg: S) -> Self {
        TelemetryError::MetricCollection(msg.into())
    }

    pub fn frame_inspection<S: Into<String>>(msg: S) -> Self {
        TelemetryError::FrameInspection(msg.into())
    }

    pub fn kernel_driver<S: Into<String>>(msg: S) -> Self {
        TelemetryError::KernelDriver(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        TelemetryError::Other(msg.into())
    }
}
