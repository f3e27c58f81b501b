//! Create/get/delete contract tests run against every backend
//!
//! Each backend is exercised with and without envelope encryption.

mod common;

use common::{secret, XorKms, MASTER_KEY};
use keyhold_core::{Error, Secret};
use keyhold_store::{FsKeyStore, KeyStore, MemKeyStore};
use std::sync::Arc;
use tempfile::TempDir;

/// A store under test plus whatever must outlive it
struct Fixture {
    store: Arc<dyn KeyStore>,
    _dir: Option<TempDir>,
}

fn fs_store(encrypted: bool) -> Fixture {
    let dir = TempDir::new().unwrap();
    let mut store = FsKeyStore::new(dir.path());
    if encrypted {
        store = store.with_kms(MASTER_KEY, Arc::new(XorKms::new(MASTER_KEY)));
    }
    Fixture {
        store: Arc::new(store),
        _dir: Some(dir),
    }
}

fn mem_store(encrypted: bool) -> Fixture {
    let mut store = MemKeyStore::new();
    if encrypted {
        store = store.with_kms(MASTER_KEY, Arc::new(XorKms::new(MASTER_KEY)));
    }
    Fixture {
        store: Arc::new(store),
        _dir: None,
    }
}

fn fixtures() -> Vec<(&'static str, Fixture)> {
    vec![
        ("fs", fs_store(false)),
        ("fs+kms", fs_store(true)),
        ("mem", mem_store(false)),
        ("mem+kms", mem_store(true)),
    ]
}

#[tokio::test]
async fn test_create_then_get() {
    for (backend, fixture) in fixtures() {
        let store = &fixture.store;
        store.create("my-key", secret(1)).await.unwrap();
        assert_eq!(store.get("my-key").await.unwrap(), secret(1), "{backend}");
    }
}

#[tokio::test]
async fn test_create_twice_keeps_first_secret() {
    for (backend, fixture) in fixtures() {
        let store = &fixture.store;
        store.create("my-key", secret(1)).await.unwrap();

        let result = store.create("my-key", secret(2)).await;
        assert!(matches!(result, Err(Error::KeyExists)), "{backend}");
        assert_eq!(store.get("my-key").await.unwrap(), secret(1), "{backend}");
    }
}

#[tokio::test]
async fn test_get_absent_is_not_found() {
    for (backend, fixture) in fixtures() {
        let result = fixture.store.get("missing").await;
        assert!(matches!(result, Err(Error::KeyNotFound)), "{backend}");
    }
}

#[tokio::test]
async fn test_delete_then_get_is_not_found() {
    for (backend, fixture) in fixtures() {
        let store = &fixture.store;
        store.create("my-key", secret(1)).await.unwrap();
        store.get("my-key").await.unwrap();

        store.delete("my-key").await.unwrap();
        let result = store.get("my-key").await;
        assert!(matches!(result, Err(Error::KeyNotFound)), "{backend}");
    }
}

#[tokio::test]
async fn test_delete_absent_succeeds() {
    for (backend, fixture) in fixtures() {
        assert!(fixture.store.delete("missing").await.is_ok(), "{backend}");
    }
}

#[tokio::test]
async fn test_create_after_delete() {
    for (backend, fixture) in fixtures() {
        let store = &fixture.store;
        store.create("my-key", secret(1)).await.unwrap();
        store.delete("my-key").await.unwrap();

        store.create("my-key", secret(2)).await.unwrap();
        assert_eq!(store.get("my-key").await.unwrap(), secret(2), "{backend}");
    }
}

#[tokio::test]
async fn test_invalid_names_rejected() {
    for (backend, fixture) in fixtures() {
        let store = &fixture.store;
        for name in ["", "..", "../escape", "a/b"] {
            assert!(
                matches!(
                    store.create(name, secret(1)).await,
                    Err(Error::InvalidName { .. })
                ),
                "{backend}: create {name:?}"
            );
            assert!(
                matches!(store.get(name).await, Err(Error::InvalidName { .. })),
                "{backend}: get {name:?}"
            );
            assert!(
                matches!(store.delete(name).await, Err(Error::InvalidName { .. })),
                "{backend}: delete {name:?}"
            );
        }
    }
}

#[tokio::test]
async fn test_stores_are_independent() {
    let a = mem_store(false);
    let b = mem_store(false);
    a.store.create("my-key", secret(1)).await.unwrap();

    assert!(matches!(b.store.get("my-key").await, Err(Error::KeyNotFound)));
}

#[tokio::test]
async fn test_fs_store_reopened_reads_existing_keys() {
    let dir = TempDir::new().unwrap();
    let kms = Arc::new(XorKms::new(MASTER_KEY));

    let first = FsKeyStore::new(dir.path()).with_kms(MASTER_KEY, kms.clone());
    first.create("my-key", secret(7)).await.unwrap();
    drop(first);

    let second = FsKeyStore::new(dir.path()).with_kms(MASTER_KEY, kms);
    assert_eq!(second.get("my-key").await.unwrap(), secret(7));
    assert!(matches!(
        second.create("my-key", secret(8)).await,
        Err(Error::KeyExists)
    ));
}

async fn race_creators(store: Arc<dyn KeyStore>) {
    const CREATORS: u8 = 16;

    let mut handles = Vec::new();
    for i in 0..CREATORS {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let result = store.create("contested", secret(i + 1)).await;
            (i, result)
        }));
    }

    let mut winners = Vec::new();
    let mut losers = 0;
    for handle in handles {
        match handle.await.unwrap() {
            (i, Ok(())) => winners.push(i),
            (_, Err(Error::KeyExists)) => losers += 1,
            (_, Err(e)) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(losers, CREATORS as usize - 1);
    let winner: Secret = secret(winners[0] + 1);
    assert_eq!(store.get("contested").await.unwrap(), winner);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creators_fs() {
    let fixture = fs_store(true);
    race_creators(fixture.store.clone()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creators_mem() {
    let fixture = mem_store(true);
    race_creators(fixture.store.clone()).await;
}
