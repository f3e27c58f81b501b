//! Hierarchical configuration loader
//!
//! Loads configuration with the following precedence (low to high):
//! 1. Built-in defaults
//! 2. Config file (explicit path, or ~/.keyhold/config.yaml when present)
//! 3. Environment variables (KEYHOLD_* prefix)
//! 4. CLI flags (handled by caller)

use super::types::{KeyholdConfig, KmsConfig};
use crate::error::{Error, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the config file inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Configuration hierarchy loader
pub struct ConfigLoader {
    /// Directory searched for the default config file
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Create a loader rooted at ~/.keyhold
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::invalid_config("Could not determine home directory"))?;
        Ok(Self {
            config_dir: home.join(".keyhold"),
        })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Load configuration with hierarchical precedence
    ///
    /// An explicit `path` must exist; the default config file is optional.
    pub fn load(&self, path: Option<&Path>) -> Result<KeyholdConfig> {
        let mut config = KeyholdConfig::default();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::config_not_found(path.display().to_string()));
                }
                config = Self::load_yaml_file(path)?;
            }
            None => {
                let default_path = self.config_dir.join(CONFIG_FILE_NAME);
                if default_path.exists() {
                    config = Self::load_yaml_file(&default_path)?;
                }
            }
        }

        config = Self::apply_env_overrides(config)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load a YAML file and parse it
    fn load_yaml_file(path: &Path) -> Result<KeyholdConfig> {
        debug!(path = %path.display(), "Loading configuration file");
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml_ng::from_str(&content)?)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: KeyholdConfig) -> Result<KeyholdConfig> {
        if let Ok(val) = env::var("KEYHOLD_STORE_BACKEND") {
            config.store.backend = val.parse().map_err(Error::invalid_config)?;
        }

        if let Ok(val) = env::var("KEYHOLD_STORE_DIR") {
            config.store.dir = PathBuf::from(val);
        }

        if let Ok(val) = env::var("KEYHOLD_CACHE_EXPIRY_SECS") {
            config.cache.expiry_secs = val.parse().map_err(|_| {
                Error::invalid_config("KEYHOLD_CACHE_EXPIRY_SECS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("KEYHOLD_CACHE_EXPIRY_UNUSED_SECS") {
            config.cache.expiry_unused_secs = val.parse().map_err(|_| {
                Error::invalid_config("KEYHOLD_CACHE_EXPIRY_UNUSED_SECS must be a valid number")
            })?;
        }

        let env_key = env::var("KEYHOLD_KMS_KEY").ok();
        let env_key_file = env::var("KEYHOLD_KMS_KEY_FILE").ok().map(PathBuf::from);
        if env_key.is_some() || env_key_file.is_some() {
            let mut kms = config.kms.take().unwrap_or(KmsConfig {
                key: String::new(),
                key_file: PathBuf::new(),
            });
            if let Some(key) = env_key {
                kms.key = key;
            }
            if let Some(key_file) = env_key_file {
                kms.key_file = key_file;
            }
            config.kms = Some(kms);
        }

        Ok(config)
    }

    /// Reject configurations a key store cannot be built from
    pub fn validate(config: &KeyholdConfig) -> Result<()> {
        if config.store.dir.as_os_str().is_empty() {
            return Err(Error::invalid_config("store.dir must not be empty"));
        }
        if let Some(kms) = &config.kms {
            if kms.key.trim().is_empty() {
                return Err(Error::invalid_config("kms.key must not be empty"));
            }
            if kms.key_file.as_os_str().is_empty() {
                return Err(Error::invalid_config("kms.key_file must not be empty"));
            }
        }
        Ok(())
    }
}
