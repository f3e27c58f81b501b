//! Command implementations

pub mod config;
pub mod key;
pub mod master_key;

use anyhow::{Context, Result};
use camino::Utf8Path;
use keyhold_core::{ConfigLoader, KeyholdConfig};
use tracing::debug;

/// Resolve configuration from defaults, the config file and the environment
pub(crate) fn load_config(path: Option<&Utf8Path>) -> Result<KeyholdConfig> {
    let loader = ConfigLoader::new()?;
    let config = loader
        .load(path.map(Utf8Path::as_std_path))
        .context("Failed to load configuration")?;
    debug!(backend = %config.store.backend, "Resolved configuration");
    Ok(config)
}
