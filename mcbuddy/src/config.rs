//! Persistent application configuration.
//!
//! Stored as JSON in a platform-appropriate config directory. Every field has a
//! default, so a partial file only overrides what it names.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// On-disk configuration for the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target window application name (from `xcap::Window::app_name()`).
    ///
    /// If multiple windows share the same app name, the first match is used.
    pub app_name: String,

    /// Delay (seconds) between ticks.
    pub poll_delay_s: f32,

    /// Upper bound (seconds) for the backoff while the game window is missing.
    pub max_backoff_s: f32,

    /// Optional max capture height (downscales large captures before any crop).
    pub max_capture_height: Option<u32>,

    /// Name shown in the player list for the local player.
    pub local_player_name: String,

    /// Read the player list on every Nth fused tick, counting from one
    /// (1 = every tick, 2 = ticks 2, 4, 6...).
    pub players_every_n: u32,

    pub vlm: ie::vlm::VlmConfig,
    pub fusion: state::FusionConfig,
    pub ocr: OcrConfig,

    /// Weights for the learned policy. The rule-based policy is used when unset.
    pub policy_path: Option<PathBuf>,

    /// Where episode logs go. Defaults to the platform data directory.
    pub episodes_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Folder holding the OCR models; searched for when unset.
    pub dir: Option<PathBuf>,
    /// Model language prefix (`<lang>_recognition.mnn`, `<lang>_charset.txt`).
    pub lang: String,
    /// Refuse to start without OCR instead of falling back to the model alone.
    pub require: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            dir: None,
            lang: "latin".to_string(),
            require: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Magic Chess: Go Go".to_string(),
            poll_delay_s: 1.0,
            max_backoff_s: 10.0,
            max_capture_height: Some(1080),
            local_player_name: String::new(),
            players_every_n: 2,
            vlm: ie::vlm::VlmConfig::default(),
            fusion: state::FusionConfig::default(),
            ocr: OcrConfig::default(),
            policy_path: None,
            episodes_dir: None,
        }
    }
}

impl Config {
    /// Default path to the config file.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("config_dir() unavailable")?;
        Ok(base.join("mcbuddy.json"))
    }

    /// Load configuration from disk, falling back to defaults on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(error = format!("{err:#}"), "failed to load config; using defaults");
                Self::default()
            }
        }
    }

    /// Try to load configuration from disk. A missing file is not an error.
    pub fn try_load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
        let cfg = serde_json::from_str(&json).with_context(|| format!("parse {:?}", path))?;
        Ok(cfg)
    }

    /// Save configuration to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(path, json).with_context(|| format!("write {:?}", path))?;
        Ok(())
    }

    pub fn episodes_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.episodes_dir {
            return Ok(dir.clone());
        }
        let base = dirs::data_dir().context("data_dir() unavailable")?;
        Ok(base.join("mcbuddy").join("episodes"))
    }
}
