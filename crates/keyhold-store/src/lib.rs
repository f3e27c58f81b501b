//! # keyhold-store
//!
//! Cached key stores for keyhold.
//!
//! - [`Cache`]: concurrent secret cache with absolute and idle expiry
//! - [`KeyStore`]: the create/get/delete contract every backend satisfies
//! - [`FsKeyStore`] and [`MemKeyStore`]: filesystem and in-memory backends,
//!   both with optional envelope encryption through a [`keyhold_core::Kms`]
//!
//! # Example
//!
//! ```no_run
//! use keyhold_core::Secret;
//! use keyhold_store::{FsKeyStore, KeyStore};
//! use std::time::Duration;
//!
//! # async fn run() -> keyhold_core::Result<()> {
//! let store = FsKeyStore::new("/var/lib/keyhold/keys")
//!     .with_cache_expiry(Duration::from_secs(300))
//!     .with_cache_expiry_unused(Duration::from_secs(30));
//!
//! store.create("my-key", Secret::generate()).await?;
//! let secret = store.get("my-key").await?;
//! # let _ = secret;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod log;
pub mod store;

pub use cache::Cache;
pub use log::ErrorLog;
pub use store::{open, validate_name, FsKeyStore, KeyStore, MemKeyStore};
