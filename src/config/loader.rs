//! Configuration file loader.

use std::path::{Path, PathBuf};

use super::BridgeConfig;

/// File name looked up in the current directory.
pub const LOCAL_CONFIG_FILE: &str = "mc-bridge.toml";

/// Configuration loader that searches multiple locations.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths in order of priority.
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths.
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        // 1. Current directory: mc-bridge.toml
        search_paths.push(PathBuf::from(LOCAL_CONFIG_FILE));

        // 2. User config directory: ~/.config/mc-bridge/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("mc-bridge").join("config.toml"));
        }

        Self { search_paths }
    }

    /// Create a config loader with a specific config file path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            search_paths: vec![path],
        }
    }

    /// Load configuration from the first available file, or return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load(&self) -> Result<BridgeConfig, ConfigError> {
        if let Some(path) = self.find_config_file() {
            tracing::debug!(path = %path.display(), "Loading config file");
            return Self::load_from_path(&path);
        }

        tracing::debug!(searched = ?self.search_paths, "No config file found, using defaults");
        Ok(BridgeConfig::default())
    }

    fn load_from_path(path: &Path) -> Result<BridgeConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Find the first config file that exists.
    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths.iter().find(|p| p.exists()).cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
