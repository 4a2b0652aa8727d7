//! Template service configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::constants::{search, storage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateServiceConfig {
    /// Page size used when a search does not specify one
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_templates_key")]
    pub templates_key: String,
    #[serde(default = "default_usage_stats_key")]
    pub usage_stats_key: String,
    /// Seed the system default templates on initialize
    #[serde(default = "default_seed_defaults")]
    pub seed_defaults: bool,
}

fn default_page_size() -> usize {
    search::DEFAULT_PAGE_SIZE
}

fn default_templates_key() -> String {
    storage::TEMPLATES_KEY.to_string()
}

fn default_usage_stats_key() -> String {
    storage::USAGE_STATS_KEY.to_string()
}

fn default_seed_defaults() -> bool {
    true
}

impl Default for TemplateServiceConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            templates_key: default_templates_key(),
            usage_stats_key: default_usage_stats_key(),
            seed_defaults: default_seed_defaults(),
        }
    }
}

impl TemplateServiceConfig {
    /// Load from a JSON file, falling back to defaults when it does not exist
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No template config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).await.map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Parse)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(ConfigError::Io)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        fs::write(path, content).await.map_err(ConfigError::Io)?;
        log::info!("Saved template config to {:?}", path);
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(serde_json::Error),

    #[error("Serialize error: {0}")]
    Serialize(serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TemplateServiceConfig =
            serde_json::from_str(r#"{"defaultPageSize": 5}"#).unwrap();
        assert_eq!(config.default_page_size, 5);
        assert_eq!(config.templates_key, "diagram_templates");
        assert!(config.seed_defaults);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("templates").join("config.json");
        let config = TemplateServiceConfig {
            seed_defaults: false,
            ..Default::default()
        };

        config.save(&path).await.unwrap();
        let loaded = TemplateServiceConfig::load(&path).await.unwrap();
        assert_eq!(loaded, config);
    }
}
