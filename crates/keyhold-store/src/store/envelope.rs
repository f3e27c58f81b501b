//! Envelope encryption of stored secrets
//!
//! Without a KMS a secret is stored as its hex string. With a KMS it is
//! encrypted under the configured master key and stored as a ciphertext
//! record. KMS failures never reach the caller as-is: sealing fails with an
//! internal error and unsealing fails with a sealed key.

use crate::log::ErrorLog;
use keyhold_core::{Ciphertext, Error, Kms, Result, Secret};
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Default)]
pub(crate) struct Envelope {
    kms: Option<(String, Arc<dyn Kms>)>,
}

impl Envelope {
    pub(crate) fn with_kms(key: impl Into<String>, kms: Arc<dyn Kms>) -> Self {
        Self {
            kms: Some((key.into(), kms)),
        }
    }

    /// Turn `secret` into the record persisted for `name`
    pub(crate) async fn seal(&self, name: &str, secret: &Secret, log: &ErrorLog) -> Result<String> {
        let Some((key, kms)) = &self.kms else {
            return Ok(secret.to_hex());
        };
        match kms.encrypt(key, secret).await {
            Ok(ciphertext) => Ok(ciphertext.to_string()),
            Err(e) => {
                log.error("encrypt", name, &e);
                Err(Error::internal("cannot encrypt key"))
            }
        }
    }

    /// Recover the secret from the record persisted for `name`
    pub(crate) async fn unseal(&self, name: &str, record: &[u8], log: &ErrorLog) -> Result<Secret> {
        let Some((_, kms)) = &self.kms else {
            return Secret::from_slice(record).inspect_err(|e| log.error("parse", name, e));
        };
        let ciphertext = match Ciphertext::from_slice(record) {
            Ok(ciphertext) => ciphertext,
            Err(e) => {
                log.error("parse", name, &e);
                return Err(Error::KeySealed);
            }
        };
        kms.decrypt(&ciphertext).await.map_err(|e| {
            log.error("decrypt", name, &e);
            Error::KeySealed
        })
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("key", &self.kms.as_ref().map(|(key, _)| key))
            .finish()
    }
}
