//! # Cached session records
//!
//! A [`SessionRecord`] is the JSON document persisted after a successful staff sign-in:
//!
//! ```json
//! { "user": { ... }, "timestamp": 1760000000000 }
//! ```
//!
//! `timestamp` is the creation time in Unix milliseconds. [`SessionCache`] binds a
//! record type to one key of a [`KeyValueStore`] and provides typed `load` / `save` /
//! `clear`. It is generic over the user type so this crate stays independent of the
//! principal model defined in `api`.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::kv::{KeyValueStore, StoreError};

/// Persisted session document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord<T> {
    pub user: T,
    /// Creation time, Unix milliseconds.
    pub timestamp: i64,
}

impl<T> SessionRecord<T> {
    pub fn new(user: T, timestamp: i64) -> Self {
        Self { user, timestamp }
    }

    /// Whether the record is older than `ttl` at `now_ms`.
    ///
    /// A timestamp in the future counts as fresh.
    pub fn is_expired(&self, now_ms: i64, ttl: Duration) -> bool {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.timestamp) > ttl_ms
    }
}

/// Typed accessor for a single session record key.
pub struct SessionCache<T> {
    store: Arc<dyn KeyValueStore>,
    key: String,
    _user: PhantomData<fn() -> T>,
}

impl<T> Clone for SessionCache<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
            _user: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for SessionCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache").field("key", &self.key).finish()
    }
}

impl<T> SessionCache<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            _user: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the stored record. `Ok(None)` when nothing is stored; an error when the
    /// stored value is not a valid record.
    pub fn load(&self) -> Result<Option<SessionRecord<T>>, StoreError> {
        let Some(raw) = self.store.get_item(&self.key) else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Persist `user` with the given creation time.
    pub fn save(&self, user: &T, timestamp: i64) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&SessionRecord::new(user, timestamp))?;
        self.store.set_item(&self.key, &raw)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove_item(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct User {
        email: String,
    }

    fn cache(store: &MemoryStore) -> SessionCache<User> {
        SessionCache::new(Arc::new(store.clone()), "dm-brands-auth")
    }

    #[test]
    fn test_save_and_load() {
        let store = MemoryStore::new();
        let cache = cache(&store);

        assert!(cache.load().unwrap().is_none());

        let user = User {
            email: "admin@example.com".to_string(),
        };
        cache.save(&user, 1_000).unwrap();

        let record = cache.load().unwrap().unwrap();
        assert_eq!(record.user, user);
        assert_eq!(record.timestamp, 1_000);

        // Raw format is `{ user, timestamp }`
        let raw: serde_json::Value =
            serde_json::from_str(&store.get_item("dm-brands-auth").unwrap()).unwrap();
        assert_eq!(raw["user"]["email"], "admin@example.com");
        assert_eq!(raw["timestamp"], 1_000);

        cache.clear().unwrap();
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_record_is_an_error() {
        let store = MemoryStore::new();
        store.set_item("dm-brands-auth", "not json").unwrap();

        assert!(matches!(
            cache(&store).load(),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_expiry() {
        let record = SessionRecord::new((), 10_000);
        let ttl = Duration::from_secs(5);

        assert!(!record.is_expired(10_000, ttl));
        assert!(!record.is_expired(15_000, ttl));
        assert!(record.is_expired(15_001, ttl));
        // Clock skew: future timestamps are fresh
        assert!(!record.is_expired(0, ttl));
    }
}
