//! In-memory secret cache
//!
//! Sits in front of every key store backend. Entries are evicted by two
//! independent background sweeps: one by age since insertion, one by time
//! since the last read. The cache is never authoritative; an evicted entry is
//! simply reloaded from the backend on the next read.

use keyhold_core::Secret;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

/// Shortest period a sweep runs at
const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(1);

struct CacheEntry {
    secret: Secret,
    created_at: Instant,
    last_used: Instant,
}

impl CacheEntry {
    fn new(secret: Secret) -> Self {
        let now = Instant::now();
        Self {
            secret,
            created_at: now,
            last_used: now,
        }
    }
}

type Table = RwLock<HashMap<String, CacheEntry>>;

/// Which timestamp a sweep measures expiry from
#[derive(Debug, Clone, Copy)]
enum Expiry {
    /// Time since the entry was inserted
    Created,
    /// Time since the entry was last read
    Unused,
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expiry::Created => write!(f, "created"),
            Expiry::Unused => write!(f, "unused"),
        }
    }
}

/// Concurrent name → secret cache
#[derive(Default)]
pub struct Cache {
    entries: Arc<Table>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `name`, refreshing its last-used time on a hit
    pub async fn get(&self, name: &str) -> Option<Secret> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(name)?;
        entry.last_used = Instant::now();
        Some(entry.secret.clone())
    }

    /// Insert or overwrite `name`
    pub async fn set(&self, name: &str, secret: Secret) {
        let mut entries = self.entries.write().await;
        entries.insert(name.to_string(), CacheEntry::new(secret));
    }

    /// Insert `name` only if absent
    ///
    /// Returns the secret now held by the cache and whether it was inserted.
    /// When another caller got there first, its secret is returned.
    pub async fn add(&self, name: &str, secret: Secret) -> (Secret, bool) {
        let mut entries = self.entries.write().await;
        match entries.entry(name.to_string()) {
            Entry::Occupied(entry) => (entry.get().secret.clone(), false),
            Entry::Vacant(entry) => {
                entry.insert(CacheEntry::new(secret.clone()));
                (secret, true)
            }
        }
    }

    /// Remove `name`. A no-op if it is not cached.
    pub async fn delete(&self, name: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(name);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Start a sweep evicting entries older than `expiry`
    ///
    /// The sweep runs every `expiry`. Returns `None` (no sweep) for a zero
    /// duration. The sweep ends once the cache is dropped.
    pub fn start_gc(&self, expiry: Duration) -> Option<JoinHandle<()>> {
        if expiry.is_zero() {
            return None;
        }
        Some(self.spawn_sweep(Expiry::Created, expiry, expiry))
    }

    /// Start a sweep evicting entries not read within `expiry`
    ///
    /// The sweep runs every `expiry / 2`, so an unused entry is gone at most
    /// `1.5 * expiry` after its last read. Returns `None` for a zero duration.
    pub fn start_unused_gc(&self, expiry: Duration) -> Option<JoinHandle<()>> {
        if expiry.is_zero() {
            return None;
        }
        let period = (expiry / 2).max(MIN_SWEEP_PERIOD);
        Some(self.spawn_sweep(Expiry::Unused, expiry, period))
    }

    fn spawn_sweep(&self, policy: Expiry, expiry: Duration, period: Duration) -> JoinHandle<()> {
        let table: Weak<Table> = Arc::downgrade(&self.entries);
        debug!(policy = %policy, ?expiry, ?period, "Starting cache sweep");

        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(entries) = table.upgrade() else {
                    debug!(policy = %policy, "Cache dropped, stopping sweep");
                    break;
                };
                let removed = Self::sweep(&entries, policy, expiry).await;
                if removed > 0 {
                    debug!(policy = %policy, removed, "Evicted expired cache entries");
                }
            }
        })
    }

    async fn sweep(entries: &Table, policy: Expiry, expiry: Duration) -> usize {
        let now = Instant::now();
        let mut entries = entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| {
            let since = match policy {
                Expiry::Created => entry.created_at,
                Expiry::Unused => entry.last_used,
            };
            now.duration_since(since) < expiry
        });
        before - entries.len()
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache").finish_non_exhaustive()
    }
}
