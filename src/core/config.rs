use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

fn default_true() -> bool {
    true
}

fn default_sensor_interval_ms() -> u64 {
    2000
}

fn default_fps_interval_ms() -> u64 {
    1000
}

fn default_fps_blacklist() -> Vec<String> {
    // Shell/system processes that own the foreground window but are never
    // worth attaching a frame inspector to.
    [
        "explorer",
        "dwm",
        "searchhost",
        "textinputhost",
        "shellexperiencehost",
        "lockapp",
        "taskmgr",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    /// Whether the hardware-monitor gateway is enabled. Initialization flips
    /// this off permanently when the enumeration library's native dependency
    /// cannot be loaded, so later sessions skip the expensive probe.
    #[serde(default = "default_true")]
    pub hardware_monitor_enabled: bool,

    /// Process names (without extension) the FPS monitor must never attach to.
    #[serde(default = "default_fps_blacklist")]
    pub fps_process_blacklist: Vec<String>,

    /// Poll interval for sensor snapshot consumers, in milliseconds.
    #[serde(default = "default_sensor_interval_ms")]
    pub sensor_poll_interval_ms: u64,

    /// Poll interval for the foreground FPS monitor, in milliseconds.
    #[serde(default = "default_fps_interval_ms")]
    pub fps_poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hardware_monitor_enabled: true,
            fps_process_blacklist: default_fps_blacklist(),
            sensor_poll_interval_ms: default_sensor_interval_ms(),
            fps_poll_interval_ms: default_fps_interval_ms(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &PathBuf) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let data = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // If the file is empty or corrupted, return default config
        // (this can happen when the config format changes)
        if data.is_empty() {
            return Ok(Config::default());
        }

        Ok(serde_json::from_str(&data).unwrap_or_default())
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let data = serde_json::to_string_pretty(self)?;
        fs::write(config_path, data)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Permanently disable the hardware-monitor gateway and persist the choice.
    pub fn disable_hardware_monitor(&mut self) -> Result<()> {
        self.hardware_monitor_enabled = false;
        self.save()
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("hwpulse").join("config.json"))
    }
}
