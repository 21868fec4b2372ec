//! # Filesystem-backed key/value store
//!
//! [`FileStore`] is a [`KeyValueStore`] implementation that persists each key as one
//! file under a base directory. It is the desktop equivalent of browser
//! `localStorage`: the cached session survives app restarts.
//!
//! ## Layout
//!
//! ```text
//! <base_dir>/
//! └── <sanitised key>.json     # raw value string
//! ```
//!
//! Keys map one-to-one onto file names, so only `[A-Za-z0-9._-]` keys that do not
//! start with `.` are accepted; anything else is rejected with
//! [`StoreError::InvalidKey`] and can never escape the base directory. Use
//! `dirs::data_dir()` to obtain a platform-appropriate base.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::kv::{KeyValueStore, StoreError};

/// Filesystem-backed KeyValueStore for desktop persistence.
#[derive(Clone, Debug)]
pub struct FileStore {
    base: PathBuf,
    // Serialises writers within one process.
    lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn new(base: PathBuf) -> Self {
        Self {
            base,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn item_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.base.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Option<String> {
        let path = match self.item_path(key) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Refusing to read stored item: {}", e);
                return None;
            }
        };
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match std::fs::read_to_string(path) {
            Ok(value) => Some(value),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("Failed to read stored item {}: {}", key, e);
                None
            }
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.item_path(key)?;
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        std::fs::create_dir_all(&self.base)?;
        std::fs::write(path, value)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        let path = self.item_path(key)?;
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileStore::new(dir.path().join("imagebank"));
        store.set_item("dm-brands-auth", "{\"user\":1}").unwrap();

        // Re-open from same directory
        let reopened = FileStore::new(dir.path().join("imagebank"));
        assert_eq!(
            reopened.get_item("dm-brands-auth").as_deref(),
            Some("{\"user\":1}")
        );

        reopened.remove_item("dm-brands-auth").unwrap();
        assert!(store.get_item("dm-brands-auth").is_none());

        // Second removal is a no-op
        reopened.remove_item("dm-brands-auth").unwrap();
    }

    #[test]
    fn test_unsafe_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("imagebank"));

        for key in ["../outside", "a/b", "", ".hidden", "sp ace"] {
            assert!(matches!(store.set_item(key, "x"), Err(StoreError::InvalidKey(_))));
            assert!(matches!(store.remove_item(key), Err(StoreError::InvalidKey(_))));
            assert!(store.get_item(key).is_none());
        }
        assert!(!dir.path().join("outside.json").exists());
    }

    #[test]
    fn test_distinct_keys_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());

        store.set_item("a_b", "underscore").unwrap();
        assert!(store.set_item("a/b", "slash").is_err());
        assert_eq!(store.get_item("a_b").as_deref(), Some("underscore"));
    }
}
