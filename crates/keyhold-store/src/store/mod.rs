//! Key stores
//!
//! A key store maps names to secrets. The durable backend is the single source
//! of truth; every backend composes a [`Cache`] in front of it and an optional
//! KMS envelope behind it. All backends follow the same contract:
//!
//! - `create` fails with [`Error::KeyExists`] when the name is present and
//!   never mutates an existing entry
//! - `get` fails with [`Error::KeyNotFound`] when the name is absent
//! - `delete` succeeds whether or not the name is present

mod envelope;
pub mod fs;
mod locks;
pub mod mem;

pub use fs::FsKeyStore;
pub use mem::MemKeyStore;

use crate::cache::Cache;
use crate::log::ErrorLog;
use async_trait::async_trait;
use envelope::Envelope;
use locks::NameLocks;
use keyhold_core::config::{BackendKind, KeyholdConfig};
use keyhold_core::{Error, Kms, LocalKms, Result, Secret};
use std::sync::{Arc, Once};
use std::time::Duration;
use tracing::debug;

/// Longest accepted key name in bytes
pub const MAX_NAME_LEN: usize = 255;

/// Create, fetch and delete secrets by name
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Store `secret` under `name` if no secret with that name exists
    async fn create(&self, name: &str, secret: Secret) -> Result<()>;

    /// Return the secret stored under `name`
    async fn get(&self, name: &str) -> Result<Secret>;

    /// Remove the secret stored under `name`, if any
    async fn delete(&self, name: &str) -> Result<()>;
}

#[async_trait]
impl<T> KeyStore for Arc<T>
where
    T: KeyStore + ?Sized,
{
    async fn create(&self, name: &str, secret: Secret) -> Result<()> {
        (**self).create(name, secret).await
    }

    async fn get(&self, name: &str) -> Result<Secret> {
        (**self).get(name).await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        (**self).delete(name).await
    }
}

#[async_trait]
impl<T> KeyStore for Box<T>
where
    T: KeyStore + ?Sized,
{
    async fn create(&self, name: &str, secret: Secret) -> Result<()> {
        (**self).create(name, secret).await
    }

    async fn get(&self, name: &str) -> Result<Secret> {
        (**self).get(name).await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        (**self).delete(name).await
    }
}

/// Reject names that cannot be stored as a single file in a directory
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_name(name, "name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::invalid_name(
            name,
            format!("name must not exceed {} bytes", MAX_NAME_LEN),
        ));
    }
    if name == "." || name == ".." {
        return Err(Error::invalid_name(name, "name must not be '.' or '..'"));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(Error::invalid_name(
            name,
            "name must not contain path separators or NUL",
        ));
    }
    Ok(())
}

/// State every backend composes: cache, envelope, error log and the per-name
/// locks ordering backend mutations against cache updates
#[derive(Debug)]
pub(crate) struct StoreCore {
    cache: Cache,
    init: Once,
    expiry: Option<Duration>,
    expiry_unused: Option<Duration>,
    envelope: Envelope,
    log: ErrorLog,
    locks: NameLocks,
}

impl Default for StoreCore {
    fn default() -> Self {
        Self {
            cache: Cache::new(),
            init: Once::new(),
            expiry: None,
            expiry_unused: None,
            envelope: Envelope::default(),
            log: ErrorLog::new(),
            locks: NameLocks::default(),
        }
    }
}

impl StoreCore {
    fn set_kms(&mut self, key: impl Into<String>, kms: Arc<dyn Kms>) {
        self.envelope = Envelope::with_kms(key, kms);
    }

    /// Start the cache sweeps. Runs once per store.
    fn initialize(&self) {
        self.init.call_once(|| {
            if let Some(expiry) = self.expiry {
                self.cache.start_gc(expiry);
            }
            if let Some(expiry) = self.expiry_unused {
                self.cache.start_unused_gc(expiry);
            }
        });
    }
}

/// Build the key store described by `config`
///
/// With a `kms` section the master key file is loaded into a [`LocalKms`] and
/// every secret is encrypted under it.
pub fn open(config: &KeyholdConfig) -> Result<Arc<dyn KeyStore>> {
    let kms: Option<(String, Arc<dyn Kms>)> = match &config.kms {
        Some(kms) => {
            let local = LocalKms::from_key_file(&kms.key, &kms.key_file)?;
            Some((kms.key.clone(), Arc::new(local)))
        }
        None => None,
    };
    let expiry = config.cache.expiry().unwrap_or_default();
    let expiry_unused = config.cache.expiry_unused().unwrap_or_default();

    debug!(
        backend = %config.store.backend,
        encrypted = kms.is_some(),
        "Opening key store"
    );

    match config.store.backend {
        BackendKind::Fs => {
            let mut store = FsKeyStore::new(config.store.expanded_dir())
                .with_cache_expiry(expiry)
                .with_cache_expiry_unused(expiry_unused);
            if let Some((key, kms)) = kms {
                store = store.with_kms(key, kms);
            }
            Ok(Arc::new(store))
        }
        BackendKind::Mem => {
            let mut store = MemKeyStore::new()
                .with_cache_expiry(expiry)
                .with_cache_expiry_unused(expiry_unused);
            if let Some((key, kms)) = kms {
                store = store.with_kms(key, kms);
            }
            Ok(Arc::new(store))
        }
    }
}
