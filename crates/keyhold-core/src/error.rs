//! Error types for keyhold
//!
//! Every failure a key store reports is one of these variants. Callers branch
//! on the variant, never on the message text.

use thiserror::Error;

/// Result type alias using keyhold-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Outward error conditions shared by every key store backend
#[derive(Error, Debug)]
pub enum Error {
    /// Create on a name that is already present
    #[error("key does already exist")]
    KeyExists,

    /// Get on a name that is absent
    #[error("key does not exist")]
    KeyNotFound,

    /// A stored ciphertext could not be parsed or decrypted
    #[error("key is sealed")]
    KeySealed,

    /// A stored plaintext secret could not be parsed
    #[error("secret is malformed: {reason}")]
    MalformedSecret { reason: String },

    /// A ciphertext record could not be decoded
    #[error("ciphertext is malformed")]
    MalformedCiphertext,

    /// The key name cannot be used as a store entry
    #[error("invalid key name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Durable storage failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal failure; the underlying cause is logged, not exposed
    #[error("{message}")]
    Internal { message: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),
}

impl Error {
    /// Create a malformed secret error
    pub fn malformed_secret(reason: impl Into<String>) -> Self {
        Self::MalformedSecret {
            reason: reason.into(),
        }
    }

    /// Create an invalid name error
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// HTTP status code a server should answer with for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::KeyExists | Error::InvalidName { .. } => 400,
            Error::KeySealed => 403,
            Error::KeyNotFound => 404,
            _ => 500,
        }
    }
}
