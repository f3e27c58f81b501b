//! In-process KMS backed by local master keys
//!
//! Secrets are sealed with ChaCha20-Poly1305. The master key name is bound as
//! associated data, so a ciphertext only opens under the key it names. The
//! stored bytes are `nonce || ciphertext || tag`.

use super::{Kms, KmsError};
use crate::error::{Error, Result};
use crate::secret::{Ciphertext, Secret};
use async_trait::async_trait;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::RngCore;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Size of a master key in bytes (256 bits)
pub const MASTER_KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits for ChaCha20-Poly1305)
const NONCE_SIZE: usize = 12;

/// Size of the Poly1305 authentication tag
const TAG_SIZE: usize = 16;

struct MasterKey {
    material: Zeroizing<[u8; MASTER_KEY_SIZE]>,
    enabled: bool,
}

/// KMS holding named master keys in process memory
#[derive(Default)]
pub struct LocalKms {
    keys: RwLock<HashMap<String, MasterKey>>,
}

impl LocalKms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the master key `name`
    pub fn with_key(mut self, name: impl Into<String>, material: [u8; MASTER_KEY_SIZE]) -> Self {
        self.keys.get_mut().insert(
            name.into(),
            MasterKey {
                material: Zeroizing::new(material),
                enabled: true,
            },
        );
        self
    }

    /// Create a KMS holding the single master key `name` read from a key file
    ///
    /// The file contains the hex encoded 256-bit key, as written by
    /// [`generate_key_file`].
    pub fn from_key_file(name: impl Into<String>, path: &Path) -> Result<Self> {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).to_string();
        let content = Zeroizing::new(std::fs::read_to_string(&expanded).map_err(|e| {
            Error::invalid_config(format!("Failed to read key file {}: {}", expanded, e))
        })?);

        let decoded = Zeroizing::new(hex::decode(content.trim()).map_err(|e| {
            Error::invalid_config(format!("Key file {} is not valid hex: {}", expanded, e))
        })?);
        if decoded.len() != MASTER_KEY_SIZE {
            return Err(Error::invalid_config(format!(
                "Key file {} must hold {} bytes, got {}",
                expanded,
                MASTER_KEY_SIZE,
                decoded.len()
            )));
        }

        let mut material = [0u8; MASTER_KEY_SIZE];
        material.copy_from_slice(&decoded);
        debug!(path = %expanded, "Loaded master key file");
        Ok(Self::new().with_key(name, material))
    }

    /// Disable a master key. Returns false if the key does not exist.
    pub async fn disable_key(&self, name: &str) -> bool {
        self.set_enabled(name, false).await
    }

    /// Re-enable a master key. Returns false if the key does not exist.
    pub async fn enable_key(&self, name: &str) -> bool {
        self.set_enabled(name, true).await
    }

    async fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        let mut keys = self.keys.write().await;
        match keys.get_mut(name) {
            Some(key) => {
                key.enabled = enabled;
                true
            }
            None => false,
        }
    }

    fn cipher(key: &MasterKey) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(key.material.as_ref()))
    }
}

#[async_trait]
impl Kms for LocalKms {
    async fn encrypt(&self, key: &str, plaintext: &Secret) -> std::result::Result<Ciphertext, KmsError> {
        let keys = self.keys.read().await;
        let master = keys.get(key).ok_or_else(|| KmsError::KeyNotFound {
            key: key.to_string(),
        })?;
        if !master.enabled {
            return Err(KmsError::KeyDisabled {
                key: key.to_string(),
            });
        }

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);

        let sealed = Self::cipher(master)
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: key.as_bytes(),
                },
            )
            .map_err(|e| KmsError::Other(format!("encryption failed: {}", e)))?;

        let mut bytes = Vec::with_capacity(NONCE_SIZE + sealed.len());
        bytes.extend_from_slice(&nonce_bytes);
        bytes.extend_from_slice(&sealed);
        Ok(Ciphertext::new(key, bytes))
    }

    async fn decrypt(&self, ciphertext: &Ciphertext) -> std::result::Result<Secret, KmsError> {
        let keys = self.keys.read().await;
        let master = keys.get(&ciphertext.key).ok_or_else(|| KmsError::KeyNotFound {
            key: ciphertext.key.clone(),
        })?;
        if !master.enabled {
            return Err(KmsError::KeyDisabled {
                key: ciphertext.key.clone(),
            });
        }
        if ciphertext.bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(KmsError::NotAuthentic);
        }

        let (nonce_bytes, sealed) = ciphertext.bytes.split_at(NONCE_SIZE);
        let plaintext = Zeroizing::new(
            Self::cipher(master)
                .decrypt(
                    Nonce::from_slice(nonce_bytes),
                    Payload {
                        msg: sealed,
                        aad: ciphertext.key.as_bytes(),
                    },
                )
                .map_err(|_| KmsError::NotAuthentic)?,
        );

        Secret::new(plaintext.as_slice())
            .map_err(|e| KmsError::Other(format!("decrypted secret is invalid: {}", e)))
    }
}

/// Generate a new master key file
///
/// Refuses to replace an existing file unless `overwrite` is set.
pub fn generate_key_file(path: &Path, overwrite: bool) -> Result<()> {
    let expanded_path = shellexpand::tilde(&path.to_string_lossy()).to_string();
    let path = Path::new(&expanded_path);

    if path.exists() && !overwrite {
        return Err(Error::invalid_config(format!(
            "Key file already exists: {}. Use --force to overwrite",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut material = Zeroizing::new([0u8; MASTER_KEY_SIZE]);
    rand::rng().fill_bytes(material.as_mut());
    let encoded = Zeroizing::new(hex::encode(material.as_ref()));

    std::fs::write(path, encoded.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    info!(path = %path.display(), "Generated master key file");
    Ok(())
}
