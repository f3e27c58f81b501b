//! KMS capability
//!
//! A key management system holds a set of cryptographic master keys. It can
//! encrypt a [`Secret`] with one of them and decrypt the resulting
//! [`Ciphertext`] again. Cloud KMS clients implement [`Kms`]; [`LocalKms`] is
//! an in-process implementation backed by master key files.

mod local;

pub use local::{generate_key_file, LocalKms, MASTER_KEY_SIZE};

use crate::secret::{Ciphertext, Secret};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Failure vocabulary of a KMS
///
/// Key stores never pass these to their callers: encrypt failures become an
/// internal error and decrypt failures become a sealed key.
#[derive(Error, Debug)]
pub enum KmsError {
    #[error("master key '{key}' does not exist")]
    KeyNotFound { key: String },

    #[error("master key '{key}' is disabled")]
    KeyDisabled { key: String },

    #[error("master key '{key}' is not available")]
    KeyUnavailable { key: String },

    #[error("master key '{key}' cannot be used for this operation")]
    InvalidKeyUsage { key: String },

    #[error("ciphertext is not authentic")]
    NotAuthentic,

    #[error("ciphertext was not encrypted with master key '{key}'")]
    IncorrectKey { key: String },

    #[error("{0}")]
    Other(String),
}

/// Encrypts and decrypts secrets with master keys held by a KMS
#[async_trait]
pub trait Kms: Send + Sync {
    /// Encrypt `plaintext` with the master key named `key`
    async fn encrypt(&self, key: &str, plaintext: &Secret) -> Result<Ciphertext, KmsError>;

    /// Decrypt a ciphertext produced by [`Kms::encrypt`]
    async fn decrypt(&self, ciphertext: &Ciphertext) -> Result<Secret, KmsError>;
}

#[async_trait]
impl<T> Kms for Arc<T>
where
    T: Kms + ?Sized,
{
    async fn encrypt(&self, key: &str, plaintext: &Secret) -> Result<Ciphertext, KmsError> {
        (**self).encrypt(key, plaintext).await
    }

    async fn decrypt(&self, ciphertext: &Ciphertext) -> Result<Secret, KmsError> {
        (**self).decrypt(ciphertext).await
    }
}
