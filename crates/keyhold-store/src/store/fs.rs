//! Filesystem key store
//!
//! Each secret is one file in the store directory, named after the key and
//! readable by the owner only. A file is either fully written and synced to
//! disk or removed again before `create` returns.

use super::{validate_name, KeyStore, StoreCore};
use crate::log::ErrorLog;
use async_trait::async_trait;
use keyhold_core::secret::MAX_CIPHERTEXT_SIZE;
use keyhold_core::{Error, Kms, Result, Secret};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

#[derive(Debug)]
pub struct FsKeyStore {
    dir: PathBuf,
    core: StoreCore,
}

impl FsKeyStore {
    /// Store keys as files in `dir`. The directory is created on first use.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            core: StoreCore::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
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

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    async fn create_dir(&self) -> io::Result<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o700);
        builder.create(&self.dir).await
    }
}

/// Open `path` for writing, failing if it already exists
async fn create_exclusive(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    options.open(path).await
}

/// A newly created key file
#[async_trait]
trait KeyFile: AsyncWrite + Unpin + Send {
    /// Flush data and metadata to the storage device
    async fn sync(&mut self) -> io::Result<()>;
}

#[async_trait]
impl KeyFile for File {
    async fn sync(&mut self) -> io::Result<()> {
        self.sync_all().await
    }
}

async fn write_durably<F: KeyFile>(file: &mut F, data: &[u8]) -> io::Result<()> {
    file.write_all(data).await?;
    file.flush().await?;
    file.sync().await
}

/// Write `record` to the key file just created at `path`
///
/// On failure the file is removed again and the write error is returned. A
/// failed removal is only logged.
async fn persist<F: KeyFile>(
    path: &Path,
    mut file: F,
    record: &[u8],
    name: &str,
    log: &ErrorLog,
) -> Result<()> {
    let result = write_durably(&mut file, record).await;
    drop(file);
    if let Err(e) = result {
        log.error("create", name, &e);
        if let Err(rollback) = fs::remove_file(path).await {
            log.error("rollback", name, &rollback);
        }
        return Err(e.into());
    }
    Ok(())
}

/// Read at most one byte past the largest record any decoder accepts
async fn read_record(path: &Path) -> io::Result<Vec<u8>> {
    let file = File::open(path).await?;
    let mut record = Vec::new();
    file.take(MAX_CIPHERTEXT_SIZE as u64 + 1)
        .read_to_end(&mut record)
        .await?;
    Ok(record)
}

#[async_trait]
impl KeyStore for FsKeyStore {
    async fn create(&self, name: &str, secret: Secret) -> Result<()> {
        validate_name(name)?;
        self.core.initialize();

        if self.core.cache.get(name).await.is_some() {
            return Err(Error::KeyExists);
        }
        let record = self.core.envelope.seal(name, &secret, &self.core.log).await?;

        let path = self.path(name);
        let _guard = self.core.locks.read(name).await;
        if let Err(e) = self.create_dir().await {
            self.core.log.error("create", name, &e);
            return Err(e.into());
        }
        let file = match create_exclusive(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(Error::KeyExists),
            Err(e) => {
                self.core.log.error("create", name, &e);
                return Err(e.into());
            }
        };
        persist(&path, file, record.as_bytes(), name, &self.core.log).await?;

        self.core.cache.set(name, secret).await;
        debug!(name, path = %path.display(), "Created key");
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Secret> {
        validate_name(name)?;
        self.core.initialize();

        if let Some(secret) = self.core.cache.get(name).await {
            return Ok(secret);
        }

        let _guard = self.core.locks.read(name).await;
        let record = match read_record(&self.path(name)).await {
            Ok(record) => record,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::KeyNotFound),
            Err(e) => {
                self.core.log.error("read", name, &e);
                return Err(e.into());
            }
        };
        let secret = self.core.envelope.unseal(name, &record, &self.core.log).await?;
        let (secret, _) = self.core.cache.add(name, secret).await;
        Ok(secret)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        self.core.initialize();

        let _guard = self.core.locks.write(name).await;
        let result = match fs::remove_file(self.path(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                self.core.log.error("delete", name, &e);
                Err(Error::from(e))
            }
        };
        self.core.cache.delete(name).await;
        if result.is_ok() {
            debug!(name, "Deleted key");
        }
        result
    }
}
