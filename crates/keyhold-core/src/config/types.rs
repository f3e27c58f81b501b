//! Configuration types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration (keyhold.yaml)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyholdConfig {
    /// Durable storage backend
    pub store: StoreConfig,
    /// In-memory cache expiry
    pub cache: CacheConfig,
    /// Optional envelope encryption through a KMS
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms: Option<KmsConfig>,
}

/// Which durable backend holds the keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One file per key in a directory (default)
    #[default]
    #[serde(alias = "filesystem")]
    Fs,
    /// In-process table, lost on exit
    #[serde(alias = "memory")]
    Mem,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Fs => write!(f, "fs"),
            BackendKind::Mem => write!(f, "mem"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fs" | "filesystem" => Ok(BackendKind::Fs),
            "mem" | "memory" => Ok(BackendKind::Mem),
            other => Err(format!("unknown backend '{}', expected fs or mem", other)),
        }
    }
}

/// Durable storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// Key directory for the filesystem backend
    pub dir: PathBuf,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("~/.keyhold/keys")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            dir: default_store_dir(),
        }
    }
}

impl StoreConfig {
    /// Key directory with `~` expanded
    pub fn expanded_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.dir.to_string_lossy()).to_string())
    }
}

/// Cache expiry configuration. Zero disables the corresponding sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Evict entries this many seconds after they were cached
    pub expiry_secs: u64,
    /// Evict entries not read for this many seconds
    pub expiry_unused_secs: u64,
}

impl CacheConfig {
    pub fn expiry(&self) -> Option<Duration> {
        (self.expiry_secs > 0).then(|| Duration::from_secs(self.expiry_secs))
    }

    pub fn expiry_unused(&self) -> Option<Duration> {
        (self.expiry_unused_secs > 0).then(|| Duration::from_secs(self.expiry_unused_secs))
    }
}

/// Envelope encryption through the local KMS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KmsConfig {
    /// Name of the master key new secrets are encrypted with
    pub key: String,
    /// Hex encoded master key file
    pub key_file: PathBuf,
}
