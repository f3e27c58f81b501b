//! Secret key material and its encrypted envelope
//!
//! A [`Secret`] is stored either as its hex string form (no KMS configured)
//! or, encrypted by a KMS, as a [`Ciphertext`] record:
//!
//! ```text
//! {"key":"<kms key name>","bytes":"<standard base64>"}
//! ```

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Largest secret accepted, in bytes
pub const MAX_SECRET_SIZE: usize = 4096;

/// Size of a generated secret in bytes (256 bits)
pub const GENERATED_SECRET_SIZE: usize = 32;

/// Largest ciphertext record accepted by the decoder (10 MiB)
pub const MAX_CIPHERTEXT_SIZE: usize = 10 << 20;

/// Secret key material, zeroed on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret {
    bytes: Vec<u8>,
}

impl Secret {
    /// Create a secret from raw bytes
    ///
    /// The empty secret is never valid.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let mut bytes = bytes.into();
        if bytes.is_empty() {
            return Err(Error::malformed_secret("secret is empty"));
        }
        if bytes.len() > MAX_SECRET_SIZE {
            let len = bytes.len();
            bytes.zeroize();
            return Err(Error::malformed_secret(format!(
                "secret is {} bytes, at most {} are allowed",
                len, MAX_SECRET_SIZE
            )));
        }
        Ok(Self { bytes })
    }

    /// Generate a random 256-bit secret
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; GENERATED_SECRET_SIZE];
        rand::rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Parse the canonical hex form. Surrounding whitespace is ignored.
    pub fn parse(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| Error::malformed_secret(e.to_string()))?;
        Self::new(bytes)
    }

    /// Parse the canonical hex form from raw stored bytes
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let s = std::str::from_utf8(data)
            .map_err(|_| Error::malformed_secret("secret is not valid UTF-8"))?;
        Self::parse(s)
    }

    /// Canonical hex form
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Raw key material (use with caution)
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl FromStr for Secret {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED {} bytes])", self.len())
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// A secret encrypted by a KMS
///
/// A valid ciphertext always names the KMS key that produced it.
#[derive(Clone, PartialEq, Eq)]
pub struct Ciphertext {
    /// Name of the key at the KMS - never empty once decoded
    pub key: String,
    /// The encrypted secret
    pub bytes: Vec<u8>,
}

#[derive(Serialize)]
struct EncodedRecord<'a> {
    key: &'a str,
    bytes: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DecodedRecord {
    #[serde(default)]
    key: String,
    #[serde(default)]
    bytes: String,
}

/// Reasons a ciphertext record fails to decode. Only ever logged; callers
/// see [`Error::MalformedCiphertext`].
#[derive(Debug, thiserror::Error)]
enum DecodeError {
    #[error("record exceeds the 10 MiB limit")]
    TooLarge,
    #[error("invalid record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid base64 bytes: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("record has no key")]
    MissingKey,
}

impl Ciphertext {
    pub fn new(key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            bytes: bytes.into(),
        }
    }

    /// Decode a ciphertext record
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        Self::decode(data).map_err(Self::malformed)
    }

    fn decode(data: &[u8]) -> std::result::Result<Self, DecodeError> {
        if data.len() > MAX_CIPHERTEXT_SIZE {
            return Err(DecodeError::TooLarge);
        }
        let record: DecodedRecord = serde_json::from_slice(data)?;
        if record.key.is_empty() {
            return Err(DecodeError::MissingKey);
        }
        let bytes = BASE64.decode(record.bytes.as_bytes())?;
        Ok(Self {
            key: record.key,
            bytes,
        })
    }

    fn malformed(err: DecodeError) -> Error {
        debug!(error = %err, "ciphertext decode failed");
        Error::MalformedCiphertext
    }
}

impl fmt::Display for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = EncodedRecord {
            key: &self.key,
            bytes: BASE64.encode(&self.bytes),
        };
        let json = serde_json::to_string(&record).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

impl fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ciphertext")
            .field("key", &self.key)
            .field("bytes", &format_args!("[{} bytes]", self.bytes.len()))
            .finish()
    }
}
