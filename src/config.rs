//! Configuration management for chunksync

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default chunk size (1 MiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Default hash algorithm
pub const DEFAULT_HASH_ALGORITHM: &str = "sha1";

/// Default listen address for the chunk service
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Size of the individual chunks in bytes
    pub chunksize: u64,

    /// Hash algorithm for chunk and file checksums (md5, sha1, sha256)
    pub hash_algorithm: String,

    /// Listen address for the serve command
    pub listen: String,

    /// Show progress bars
    pub progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunksize: DEFAULT_CHUNK_SIZE,
            hash_algorithm: DEFAULT_HASH_ALGORITHM.to_string(),
            listen: DEFAULT_LISTEN_ADDR.to_string(),
            progress: true,
        }
    }
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io("reading config", e))?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io("creating config dir", e))?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("serializing config: {}", e)))?;
        std::fs::write(path, contents).map_err(|e| Error::io("writing config", e))?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("chunksync").join("config.toml"))
            .ok_or_else(|| Error::config("could not determine config directory"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.chunksize, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.hash_algorithm, "sha1");
        assert!(config.progress);
    }

    #[test]
    fn config_file_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.chunksize = 4096;
        config.hash_algorithm = "sha256".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.chunksize, 4096);
        assert_eq!(loaded.hash_algorithm, "sha256");
    }

    #[test]
    fn partial_config_file_keeps_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "chunksize = 512\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.chunksize, 512);
        assert_eq!(loaded.hash_algorithm, DEFAULT_HASH_ALGORITHM);
        assert_eq!(loaded.listen, DEFAULT_LISTEN_ADDR);
    }
}
