//! Error log for key store failures
//!
//! Key stores report failures that never reach the caller (rollback errors,
//! KMS causes hidden behind a sealed key) through an [`ErrorLog`]. By default
//! events go to the process-wide `tracing` subscriber; a store can be handed
//! its own [`Dispatch`] instead.

use std::fmt;
use tracing::Dispatch;

#[derive(Clone, Default)]
pub struct ErrorLog {
    dispatch: Option<Dispatch>,
}

impl ErrorLog {
    /// Log to the process-wide subscriber
    pub fn new() -> Self {
        Self::default()
    }

    /// Log to `dispatch` instead of the process-wide subscriber
    pub fn with_dispatch(dispatch: Dispatch) -> Self {
        Self {
            dispatch: Some(dispatch),
        }
    }

    /// Record a failure of `op` on the key `name`
    pub fn error(&self, op: &str, name: &str, error: &dyn fmt::Display) {
        self.emit(|| tracing::error!(op, name, error = %error, "Key store operation failed"));
    }

    fn emit(&self, f: impl FnOnce()) {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

impl fmt::Debug for ErrorLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorLog")
            .field("dispatch", &self.dispatch.is_some())
            .finish()
    }
}
