//! Envelope encryption through a KMS
//!
//! Records persisted by an encrypting store are ciphertext records. KMS
//! failures surface as sealed keys or internal errors, with the cause only in
//! the error log.

mod common;

use common::{capture_log, secret, CountingKms, DisabledKms, XorKms, MASTER_KEY};
use keyhold_core::{Ciphertext, Error};
use keyhold_store::{FsKeyStore, KeyStore, MemKeyStore};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_fs_record_is_ciphertext_under_master_key() {
    let dir = TempDir::new().unwrap();
    let store = FsKeyStore::new(dir.path()).with_kms(MASTER_KEY, Arc::new(XorKms::new(MASTER_KEY)));
    let original = secret(0x42);

    store.create("my-key", original.clone()).await.unwrap();

    let record = std::fs::read(dir.path().join("my-key")).unwrap();
    let ciphertext = Ciphertext::from_slice(&record).unwrap();
    assert_eq!(ciphertext.key, MASTER_KEY);
    assert_ne!(ciphertext.bytes, original.as_bytes());

    // A fresh store has nothing cached and must decrypt the record
    let reopened =
        FsKeyStore::new(dir.path()).with_kms(MASTER_KEY, Arc::new(XorKms::new(MASTER_KEY)));
    assert_eq!(reopened.get("my-key").await.unwrap(), original);
}

#[tokio::test]
async fn test_decrypt_failure_is_sealed() {
    let dir = TempDir::new().unwrap();
    FsKeyStore::new(dir.path())
        .with_kms(MASTER_KEY, Arc::new(XorKms::new(MASTER_KEY)))
        .create("my-key", secret(1))
        .await
        .unwrap();

    let (log, buffer) = capture_log();
    let store = FsKeyStore::new(dir.path())
        .with_kms(MASTER_KEY, Arc::new(DisabledKms::new(MASTER_KEY)))
        .with_error_log(log);

    let result = store.get("my-key").await;
    assert!(matches!(result, Err(Error::KeySealed)));

    let logged = buffer.contents();
    assert!(logged.contains("decrypt"), "{logged}");
    assert!(logged.contains("is disabled"), "{logged}");
}

#[tokio::test]
async fn test_wrong_master_key_is_sealed() {
    let dir = TempDir::new().unwrap();
    FsKeyStore::new(dir.path())
        .with_kms("master-2", Arc::new(XorKms::new("master-2")))
        .create("my-key", secret(1))
        .await
        .unwrap();

    let (log, _buffer) = capture_log();
    let store = FsKeyStore::new(dir.path())
        .with_kms(MASTER_KEY, Arc::new(XorKms::new(MASTER_KEY)))
        .with_error_log(log);
    assert!(matches!(store.get("my-key").await, Err(Error::KeySealed)));
}

#[tokio::test]
async fn test_malformed_record_is_sealed() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("my-key"), r#"{"key":"master-1","bytes":"%%"}"#).unwrap();

    let kms = Arc::new(CountingKms::new(XorKms::new(MASTER_KEY)));
    let (log, buffer) = capture_log();
    let store = FsKeyStore::new(dir.path())
        .with_kms(MASTER_KEY, kms.clone())
        .with_error_log(log);

    assert!(matches!(store.get("my-key").await, Err(Error::KeySealed)));
    assert_eq!(kms.decrypts(), 0);
    assert!(buffer.contents().contains("ciphertext is malformed"));
}

#[tokio::test]
async fn test_plaintext_record_without_kms_is_malformed_secret() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("my-key"), "not hex at all").unwrap();

    let (log, _buffer) = capture_log();
    let store = FsKeyStore::new(dir.path()).with_error_log(log);
    assert!(matches!(
        store.get("my-key").await,
        Err(Error::MalformedSecret { .. })
    ));
}

#[tokio::test]
async fn test_encrypt_failure_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let (log, buffer) = capture_log();
    let store = FsKeyStore::new(dir.path())
        .with_kms(MASTER_KEY, Arc::new(DisabledKms::new(MASTER_KEY)))
        .with_error_log(log);

    let result = store.create("my-key", secret(1)).await;
    match result {
        Err(Error::Internal { message }) => assert_eq!(message, "cannot encrypt key"),
        other => panic!("expected internal error, got {other:?}"),
    }
    assert!(!dir.path().join("my-key").exists());
    assert!(buffer.contents().contains("encrypt"));
}

#[tokio::test]
async fn test_encrypt_failure_mem() {
    let (log, _buffer) = capture_log();
    let store = MemKeyStore::new()
        .with_kms(MASTER_KEY, Arc::new(DisabledKms::new(MASTER_KEY)))
        .with_error_log(log);

    assert!(matches!(
        store.create("my-key", secret(1)).await,
        Err(Error::Internal { .. })
    ));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_cached_create_skips_kms_on_get() {
    let kms = Arc::new(CountingKms::new(XorKms::new(MASTER_KEY)));
    let store = MemKeyStore::new().with_kms(MASTER_KEY, kms.clone());

    store.create("my-key", secret(3)).await.unwrap();
    for _ in 0..5 {
        assert_eq!(store.get("my-key").await.unwrap(), secret(3));
    }
    assert_eq!(kms.encrypts(), 1);
    assert_eq!(kms.decrypts(), 0);
}

#[tokio::test]
async fn test_cached_duplicate_create_skips_kms() {
    let kms = Arc::new(CountingKms::new(XorKms::new(MASTER_KEY)));
    let store = MemKeyStore::new().with_kms(MASTER_KEY, kms.clone());

    store.create("my-key", secret(3)).await.unwrap();
    assert!(matches!(
        store.create("my-key", secret(4)).await,
        Err(Error::KeyExists)
    ));
    assert_eq!(kms.encrypts(), 1);
}
