//! Per-name locks
//!
//! Create and get take a name's lock for reading around "backend access +
//! cache update"; delete takes it for writing around "backend remove + cache
//! purge". A get that read the backend before a delete therefore cannot put
//! the secret back into the cache afterwards. Operations on different names
//! never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

#[derive(Debug, Default)]
pub(crate) struct NameLocks {
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl NameLocks {
    pub(crate) async fn read(&self, name: &str) -> OwnedRwLockReadGuard<()> {
        self.lock_for(name).read_owned().await
    }

    pub(crate) async fn write(&self, name: &str) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(name).write_owned().await
    }

    /// Number of names with a lock currently held or awaited
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.len()
    }

    fn lock_for(&self, name: &str) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the table references an idle lock; holders and waiters own a clone
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(name.to_string()).or_default().clone()
    }
}
