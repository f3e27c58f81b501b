//! In-memory key store
//!
//! Keeps the persisted records in a process-local table. Records take the same
//! form as on disk, so envelope encryption behaves exactly as it does for the
//! filesystem backend. Everything is lost when the store is dropped.

use super::{validate_name, KeyStore, StoreCore};
use crate::log::ErrorLog;
use async_trait::async_trait;
use keyhold_core::{Error, Kms, Result, Secret};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemKeyStore {
    table: RwLock<HashMap<String, String>>,
    core: StoreCore,
}

impl MemKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evict cached secrets this long after they were cached. Zero disables.
    pub fn with_cache_expiry(mut self, expiry: Duration) -> Self {
        self.core.expiry = (!expiry.is_zero()).then_some(expiry);
        self
    }

    /// Evict cached secrets not read for this long. Zero disables.
    pub fn with_cache_expiry_unused(mut self, expiry: Duration) -> Self {
        self.core.expiry_unused = (!expiry.is_zero()).then_some(expiry);
        self
    }

    /// Encrypt secrets at rest with the master key `key` held by `kms`
    pub fn with_kms(mut self, key: impl Into<String>, kms: Arc<dyn Kms>) -> Self {
        self.core.set_kms(key, kms);
        self
    }

    pub fn with_error_log(mut self, log: ErrorLog) -> Self {
        self.core.log = log;
        self
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.read().await.is_empty()
    }
}

#[async_trait]
impl KeyStore for MemKeyStore {
    async fn create(&self, name: &str, secret: Secret) -> Result<()> {
        validate_name(name)?;
        self.core.initialize();

        if self.core.cache.get(name).await.is_some() {
            return Err(Error::KeyExists);
        }
        let record = self.core.envelope.seal(name, &secret, &self.core.log).await?;

        let _guard = self.core.locks.read(name).await;
        match self.table.write().await.entry(name.to_string()) {
            Entry::Occupied(_) => return Err(Error::KeyExists),
            Entry::Vacant(entry) => {
                entry.insert(record);
            }
        }
        self.core.cache.set(name, secret).await;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Secret> {
        validate_name(name)?;
        self.core.initialize();

        if let Some(secret) = self.core.cache.get(name).await {
            return Ok(secret);
        }

        let _guard = self.core.locks.read(name).await;
        let record = self
            .table
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or(Error::KeyNotFound)?;
        let secret = self
            .core
            .envelope
            .unseal(name, record.as_bytes(), &self.core.log)
            .await?;
        let (secret, _) = self.core.cache.add(name, secret).await;
        Ok(secret)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        self.core.initialize();

        let _guard = self.core.locks.write(name).await;
        self.table.write().await.remove(name);
        self.core.cache.delete(name).await;
        Ok(())
    }
}
