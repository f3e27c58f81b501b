//! # keyhold-core
//!
//! Core library for keyhold providing:
//! - Secret key material and the ciphertext envelope codec
//! - The KMS capability and a local ChaCha20-Poly1305 KMS
//! - The error taxonomy shared by every key store backend
//! - Configuration loading (keyhold.yaml + KEYHOLD_* environment)

pub mod config;
pub mod error;
pub mod kms;
pub mod secret;

pub use config::{ConfigLoader, KeyholdConfig};
pub use error::{Error, Result};
pub use kms::{Kms, KmsError, LocalKms};
pub use secret::{Ciphertext, Secret};
