//! Shared helpers for key store integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use keyhold_core::{Ciphertext, Kms, KmsError, Secret};
use keyhold_store::ErrorLog;
use std::io;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::Dispatch;

pub const MASTER_KEY: &str = "master-1";

pub fn secret(byte: u8) -> Secret {
    Secret::new(vec![byte; 32]).unwrap()
}

/// KMS stub that XORs every byte with a fixed pad
pub struct XorKms {
    key: String,
    pad: u8,
}

impl XorKms {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            pad: 0x5a,
        }
    }
}

#[async_trait]
impl Kms for XorKms {
    async fn encrypt(&self, key: &str, plaintext: &Secret) -> Result<Ciphertext, KmsError> {
        if key != self.key {
            return Err(KmsError::KeyNotFound {
                key: key.to_string(),
            });
        }
        let bytes: Vec<u8> = plaintext.as_bytes().iter().map(|b| b ^ self.pad).collect();
        Ok(Ciphertext::new(key, bytes))
    }

    async fn decrypt(&self, ciphertext: &Ciphertext) -> Result<Secret, KmsError> {
        if ciphertext.key != self.key {
            return Err(KmsError::IncorrectKey {
                key: ciphertext.key.clone(),
            });
        }
        let bytes: Vec<u8> = ciphertext.bytes.iter().map(|b| b ^ self.pad).collect();
        Secret::new(bytes).map_err(|e| KmsError::Other(e.to_string()))
    }
}

/// Wraps a KMS and counts the calls made to it
pub struct CountingKms<K> {
    inner: K,
    encrypts: AtomicUsize,
    decrypts: AtomicUsize,
}

impl<K> CountingKms<K> {
    pub fn new(inner: K) -> Self {
        Self {
            inner,
            encrypts: AtomicUsize::new(0),
            decrypts: AtomicUsize::new(0),
        }
    }

    pub fn encrypts(&self) -> usize {
        self.encrypts.load(Ordering::SeqCst)
    }

    pub fn decrypts(&self) -> usize {
        self.decrypts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<K: Kms> Kms for CountingKms<K> {
    async fn encrypt(&self, key: &str, plaintext: &Secret) -> Result<Ciphertext, KmsError> {
        self.encrypts.fetch_add(1, Ordering::SeqCst);
        self.inner.encrypt(key, plaintext).await
    }

    async fn decrypt(&self, ciphertext: &Ciphertext) -> Result<Secret, KmsError> {
        self.decrypts.fetch_add(1, Ordering::SeqCst);
        self.inner.decrypt(ciphertext).await
    }
}

/// KMS whose master key has been disabled after secrets were stored
pub struct DisabledKms {
    key: String,
}

impl DisabledKms {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl Kms for DisabledKms {
    async fn encrypt(&self, key: &str, _plaintext: &Secret) -> Result<Ciphertext, KmsError> {
        Err(KmsError::KeyDisabled {
            key: key.to_string(),
        })
    }

    async fn decrypt(&self, _ciphertext: &Ciphertext) -> Result<Secret, KmsError> {
        Err(KmsError::KeyDisabled {
            key: self.key.clone(),
        })
    }
}

/// KMS whose decrypt waits until the test releases it
///
/// Never releasing it models a hung KMS call.
pub struct GatedKms {
    inner: XorKms,
    /// Signalled when a decrypt starts waiting
    pub entered: Notify,
    /// Lets one waiting decrypt proceed
    pub release: Notify,
}

impl GatedKms {
    pub fn new(key: &str) -> Self {
        Self {
            inner: XorKms::new(key),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl Kms for GatedKms {
    async fn encrypt(&self, key: &str, plaintext: &Secret) -> Result<Ciphertext, KmsError> {
        self.inner.encrypt(key, plaintext).await
    }

    async fn decrypt(&self, ciphertext: &Ciphertext) -> Result<Secret, KmsError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.decrypt(ciphertext).await
    }
}

/// KMS returning a different secret from every decrypt
#[derive(Default)]
pub struct VaryingKms {
    calls: AtomicU8,
}

impl VaryingKms {
    pub fn new() -> Self {
        Self {
            calls: AtomicU8::new(0),
        }
    }

    pub fn calls(&self) -> u8 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Kms for VaryingKms {
    async fn encrypt(&self, key: &str, _plaintext: &Secret) -> Result<Ciphertext, KmsError> {
        Err(KmsError::InvalidKeyUsage {
            key: key.to_string(),
        })
    }

    async fn decrypt(&self, _ciphertext: &Ciphertext) -> Result<Secret, KmsError> {
        tokio::task::yield_now().await;
        let call = self.calls.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        Ok(secret(call))
    }
}

/// Log sink collecting formatted events in memory
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An error log writing to a buffer the test can inspect
pub fn capture_log() -> (ErrorLog, LogBuffer) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    (ErrorLog::with_dispatch(Dispatch::new(subscriber)), buffer)
}
