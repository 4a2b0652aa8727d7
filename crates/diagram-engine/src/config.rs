//! Editor configuration storage
//!
//! Tunables for history, routing, connection rules and viewport behavior,
//! persisted as JSON next to the host application's data.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::constants::{history, viewport};
use crate::routing::RoutingOptions;
use crate::validation::ConnectionPolicy;

/// Zoom and fit-to-screen behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportConfig {
    #[serde(default = "default_min_zoom")]
    pub min_zoom: f64,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,
    #[serde(default = "default_zoom_step")]
    pub zoom_step: f64,
    /// Canvas size assumed by fit-to-screen
    #[serde(default = "default_fit_width")]
    pub fit_width: f64,
    #[serde(default = "default_fit_height")]
    pub fit_height: f64,
    #[serde(default = "default_fit_padding")]
    pub fit_padding: f64,
}

fn default_min_zoom() -> f64 {
    viewport::MIN_ZOOM
}

fn default_max_zoom() -> f64 {
    viewport::MAX_ZOOM
}

fn default_zoom_step() -> f64 {
    viewport::ZOOM_STEP
}

fn default_fit_width() -> f64 {
    viewport::FIT_WIDTH
}

fn default_fit_height() -> f64 {
    viewport::FIT_HEIGHT
}

fn default_fit_padding() -> f64 {
    viewport::FIT_PADDING
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_zoom: default_min_zoom(),
            max_zoom: default_max_zoom(),
            zoom_step: default_zoom_step(),
            fit_width: default_fit_width(),
            fit_height: default_fit_height(),
            fit_padding: default_fit_padding(),
        }
    }
}

impl ViewportConfig {
    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }
}

/// Full editor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Maximum number of undo steps
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// zstd level used for history snapshots
    #[serde(default = "default_compression_level")]
    pub snapshot_compression_level: i32,
    /// Compute edge geometry on connect and when endpoints move
    #[serde(default = "default_auto_route")]
    pub auto_route: bool,
    #[serde(default)]
    pub routing: RoutingOptions,
    #[serde(default)]
    pub connections: ConnectionPolicy,
    #[serde(default)]
    pub viewport: ViewportConfig,
}

fn default_history_limit() -> usize {
    history::LIMIT
}

fn default_compression_level() -> i32 {
    history::COMPRESSION_LEVEL
}

fn default_auto_route() -> bool {
    true
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            snapshot_compression_level: default_compression_level(),
            auto_route: default_auto_route(),
            routing: RoutingOptions::default(),
            connections: ConnectionPolicy::default(),
            viewport: ViewportConfig::default(),
        }
    }
}

impl EditorConfig {
    /// Load configuration from a JSON file, or defaults if it does not exist
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).await?;
        serde_json::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save configuration as pretty-printed JSON
    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        fs::write(path, contents).await?;

        log::info!("Editor configuration saved to {:?}", path);
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(serde_json::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(serde_json::Error),
}
