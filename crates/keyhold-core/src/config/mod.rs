//! Configuration loading and management

mod loader;
mod types;

pub use loader::{ConfigLoader, CONFIG_FILE_NAME};
pub use types::{BackendKind, CacheConfig, KeyholdConfig, KmsConfig, StoreConfig};
