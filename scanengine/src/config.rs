/*!
Configuration management for the scan engine application.
*/

use crate::engine::DEFAULT_SCAN_RATE_PPS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shared::transform::TransformUpdate;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub output: OutputConfig,
}

impl AppConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self {
            engine: EngineConfig::default(),
            output: OutputConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Scan engine specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Scan rate in points per second (clamped to hardware bounds)
    pub scan_rate_pps: u32,

    /// Animation frame advance interval in milliseconds
    pub frame_interval_ms: u64,

    /// Geometry and intensity transform applied to every point
    pub transform: TransformUpdate,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_rate_pps: DEFAULT_SCAN_RATE_PPS,
            frame_interval_ms: 50,
            transform: TransformUpdate::default(),
        }
    }
}

/// Output bus specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Serial device path receiving DAC packets
    pub device_path: String,

    /// Bounded transmit queue depth, in packets
    pub queue_depth: usize,

    /// Statistics reporting interval in seconds
    pub stats_interval_seconds: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            device_path: "/dev/ttyUSB0".to_string(),
            queue_depth: 4096,
            stats_interval_seconds: 10,
        }
    }
}
