// src/config.rs

//! Configuration for a display session.
//!
//! Every section has defaults matching the tool's stock behavior, so an
//! absent or partial config file is fine. The file is JSON and is read from
//! the path in `DRM_SCRIBBLE_CONFIG`; without it the defaults are used.

use anyhow::{Context, Result};
use log::{info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "DRM_SCRIBBLE_CONFIG";

/// Process-wide configuration, loaded on first use.
pub static CONFIG: Lazy<Config> = Lazy::new(|| match Config::load() {
    Ok(config) => config,
    Err(e) => {
        warn!("Failed to load configuration, using defaults: {:#}", e);
        Config::default()
    }
});

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub limits: LimitsConfig,
    pub animation: AnimationConfig,
    /// What to do when setting up one connector fails.
    pub on_connector_error: ConnectorErrorPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    /// DRM primary node to take over.
    pub path: PathBuf,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            path: PathBuf::from("/dev/dri/card0"),
        }
    }
}

/// Upper bounds for the lists returned by two-phase queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Framebuffers, CRTCs, connectors and encoders on the card.
    pub max_resource_ids: usize,
    /// Modes, properties and encoders of one connector.
    pub max_connector_entries: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            max_resource_ids: 10,
            max_connector_entries: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnimationConfig {
    /// Outer iterations of the random walk.
    pub steps: u32,
    /// Pause after every pixel write, in microseconds.
    pub pixel_delay_us: u64,
    /// Strokes are `0..max_stroke_len` pixels long.
    pub max_stroke_len: u32,
    pub start_x: i64,
    pub start_y: i64,
    /// Extra words added to the width when computing a row offset.
    pub row_padding: u32,
    /// Fixed RNG seed; random when unset.
    pub seed: Option<u64>,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        AnimationConfig {
            steps: 300,
            pixel_delay_us: 500,
            max_stroke_len: 100,
            start_x: 500,
            start_y: 500,
            row_padding: 10,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorErrorPolicy {
    /// Tear the whole session down.
    #[default]
    Abort,
    /// Log it and move on to the next connector.
    Skip,
}

impl Config {
    /// Loads from `$DRM_SCRIBBLE_CONFIG` if set, defaults otherwise.
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => {
                info!("{} not set, using default configuration", CONFIG_ENV_VAR);
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_json(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Invalid configuration JSON")
    }
}
