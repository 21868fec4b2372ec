//! # Key/value persistence — the device-local storage seam
//!
//! [`KeyValueStore`] is the string-keyed persistence interface behind every piece of
//! local state the client keeps between restarts: the cached admin session record and
//! the per-backend auth token records. It mirrors the shape of browser `localStorage`
//! (`get_item` / `set_item` / `remove_item`) so the same logic works against an
//! in-memory map ([`crate::MemoryStore`]) or a directory of files ([`crate::FileStore`]).
//!
//! Reads never fail: an unreadable entry is reported as absent and logged. Writes and
//! removals return [`StoreError`] so callers can decide whether a failed write matters.

use thiserror::Error;

/// Errors raised by a [`KeyValueStore`] or the typed [`crate::SessionCache`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize stored value: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
}

/// String-keyed persistence shared by the whole process.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StoreError>;
}
