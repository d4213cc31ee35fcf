//! Configuration file handling for tilecam.
//!
//! Loads configuration from `~/.config/tilecam/config.toml` or a custom path.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::camera::CaptureSettings;
use crate::reticle::Reticle;

/// Configuration file structure for tilecam.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub reticle: ReticleConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CameraConfig {
    /// Camera index passed to the device opener
    #[serde(default)]
    pub device: u32,
    /// Milliseconds between capture ticks
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Serve this image instead of opening a real camera
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub still_image: Option<PathBuf>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: 0,
            interval_ms: default_interval_ms(),
            still_image: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReticleConfig {
    #[serde(default = "default_inner_radius")]
    pub inner_radius: u32,
    #[serde(default = "default_outer_radius")]
    pub outer_radius: u32,
    #[serde(default = "default_arm_length")]
    pub arm_length: u32,
    #[serde(default = "default_thickness")]
    pub thickness: u32,
    /// RGB
    #[serde(default = "default_color")]
    pub color: [u8; 3],
}

impl Default for ReticleConfig {
    fn default() -> Self {
        Self {
            inner_radius: default_inner_radius(),
            outer_radius: default_outer_radius(),
            arm_length: default_arm_length(),
            thickness: default_thickness(),
            color: default_color(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Background image whose white pixels get replaced
    #[serde(default = "default_template")]
    pub template: PathBuf,
    /// Where `save` writes the composite
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            template: default_template(),
            output: default_output(),
        }
    }
}

fn default_interval_ms() -> u64 {
    30
}

fn default_inner_radius() -> u32 {
    30
}

fn default_outer_radius() -> u32 {
    60
}

fn default_arm_length() -> u32 {
    160
}

fn default_thickness() -> u32 {
    3
}

fn default_color() -> [u8; 3] {
    [255, 0, 0]
}

fn default_template() -> PathBuf {
    PathBuf::from("images/google.png")
}

fn default_output() -> PathBuf {
    PathBuf::from("output.png")
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed or is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;
        let config = Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.clone(),
                source,
            },
            other => other,
        })?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "camera.interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.reticle.thickness == 0 {
            return Err(ConfigError::Invalid(
                "reticle.thickness must be greater than 0".to_string(),
            ));
        }
        if self.reticle.inner_radius > self.reticle.outer_radius {
            return Err(ConfigError::Invalid(format!(
                "reticle.inner_radius ({}) exceeds reticle.outer_radius ({})",
                self.reticle.inner_radius, self.reticle.outer_radius
            )));
        }
        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Capture loop settings derived from this config.
    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            interval: Duration::from_millis(self.camera.interval_ms),
            reticle: Reticle::from(&self.reticle),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[source] toml::ser::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("tilecam").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/tilecam/config.toml")
        })
}
