//! Error types for the coordination core.
//!
//! Only the persisted settings store can fail in a way callers may need to
//! inspect; lifecycle operations never raise (stale or invalid-for-phase
//! reports are tolerated as no-ops, persistence failures are logged and the
//! in-memory state stays authoritative).

use thiserror::Error;

/// Failure while reading or writing the persisted settings document.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
