use serde::{Deserialize, Serialize};
use semver::{Version, VersionReq};
use std::fs;
use std::path::Path;
use std::time::Duration;
use system::SystemConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,
    pub location: LocationConfig,
    pub board: BoardConfig,
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub control: SystemConfig,
    pub sensors: SensorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub rig_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    #[serde(default)]
    pub magnetic_declination: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    pub name: String,
    pub firmware_version: Version,
    pub required_firmware: VersionReq,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub tick_interval_ms: u64,
    pub max_ticks: Option<u64>,
    pub max_reconnects: u32,
    pub reconnect_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorsConfig {
    pub gps_pin: u8,
    pub compass_pin: u8,
    /// Heading the simulated compass reports.
    pub rig_heading: f64,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        // Try external file first
        if Path::new("config.toml").exists() {
            let config_content = fs::read_to_string("config.toml")?;
            let config: Config = toml::from_str(&config_content)?;
            log::info!("Loaded configuration from file");
            Ok(config)
        } else {
            // Fallback to embedded defaults
            let config_content = include_str!("../config.toml.example");
            let config: Config = toml::from_str(config_content)?;
            log::warn!("Using embedded default configuration");
            Ok(config)
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.runtime.tick_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.runtime.reconnect_delay_ms)
    }
}
