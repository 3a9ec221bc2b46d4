//! Application configuration.
//!
//! A single JSON file; every section and field is optional and falls back to
//! its default. The file is read once at startup and never written.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::capture::RecordingPolicy;
use crate::catalog::EffectId;
use crate::error::Error;
use crate::fx::GlitchConfig;
use crate::selector::SpinPolicy;
use crate::session::SessionOptions;

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "ARCHETYPE_MIRROR_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub camera: CameraConfig,

    /// Effect shown at startup, by string id.
    pub initial_effect: Option<String>,

    pub spin: SpinPolicy,
    pub recording: RecordingPolicy,
    pub glitch: GlitchConfig,

    /// Where snapshots and clips are written.
    pub output_dir: PathBuf,

    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub index: u32,
    /// Requested capture size; the device may pick something close.
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "archetype_mirror=debug,warn".
    pub level: String,

    /// Structured JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            initial_effect: None,
            spin: SpinPolicy::default(),
            recording: RecordingPolicy::default(),
            glitch: GlitchConfig::default(),
            output_dir: default_output_dir(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 640,
            height: 480,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::from_file(&config_path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Failed to load config at {:?}: {}", config_path, e),
            }
        }
        Self::default()
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, Error> {
        serde_json::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Session knobs. An unknown `initial_effect` is a config error.
    pub fn session_options(&self) -> Result<SessionOptions, Error> {
        let initial = self
            .initial_effect
            .as_deref()
            .map(str::parse::<EffectId>)
            .transpose()?;
        Ok(SessionOptions {
            initial,
            spin: self.spin.clone(),
            recording: self.recording.clone(),
            glitch: self.glitch.clone(),
        })
    }
}

/// `$ARCHETYPE_MIRROR_CONFIG`, else `$XDG_CONFIG_HOME/archetype-mirror/config.json`.
pub fn config_file_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));
    base.join("archetype-mirror").join("config.json")
}

fn default_output_dir() -> PathBuf {
    let pictures = home_dir().join("Pictures");
    if pictures.is_dir() {
        pictures.join("archetype-mirror")
    } else {
        PathBuf::from(".")
    }
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}
