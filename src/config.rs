//! Configuration management for the camcorder

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::device::{CameraSelection, VideoQuality};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Camera setup applied once at session start
    #[serde(default)]
    pub camera: CameraConfig,

    /// Recording output configuration
    #[serde(default)]
    pub recording: RecordingConfig,

    /// Path to config file (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Camera selected when the session starts
    #[serde(default)]
    pub default_camera: CameraSelection,

    /// Requested quality tier (the front camera ignores it)
    #[serde(default)]
    pub video_quality: VideoQuality,

    /// Torch on while recording with the rear camera
    #[serde(default)]
    pub flash_enabled: bool,

    /// Follow device rotation notifications instead of the layout orientation
    #[serde(default)]
    pub use_device_orientation: bool,

    /// Double tap on the preview switches cameras
    #[serde(default = "default_true")]
    pub double_tap_camera_switch: bool,

    /// Mix with other audio instead of silencing it
    #[serde(default = "default_true")]
    pub allow_background_audio: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Where recordings are written; the process temp dir when unset
    #[serde(default)]
    pub output_directory: Option<PathBuf>,

    /// Container extension for recorded files
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// How often the recorded duration is reported (ms)
    #[serde(default = "default_duration_sample_interval")]
    pub duration_sample_interval_ms: u64,

    /// Attach the microphone alongside the camera
    #[serde(default = "default_true")]
    pub record_audio: bool,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_file_extension() -> String {
    "mov".to_string()
}

fn default_duration_sample_interval() -> u64 {
    100
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            default_camera: CameraSelection::default(),
            video_quality: VideoQuality::default(),
            flash_enabled: false,
            use_device_orientation: false,
            double_tap_camera_switch: true,
            allow_background_audio: true,
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_directory: None,
            file_extension: default_file_extension(),
            duration_sample_interval_ms: default_duration_sample_interval(),
            record_audio: true,
        }
    }
}

impl RecordingConfig {
    /// Resolved output directory
    pub fn output_dir(&self) -> PathBuf {
        self.output_directory
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("camcorder-recordings"))
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.duration_sample_interval_ms.max(1))
    }
}

impl Config {
    /// Load configuration from default location or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config {
                config_path: Some(config_path),
                ..Config::default()
            };
            config.save()?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.config_path()?;

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the config file path
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_config_path(),
        }
    }

    /// Get default config path
    fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("dev", "camcorder", "camcorder")
            .context("Failed to determine config directory")?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }
}
