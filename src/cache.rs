use bytes::Bytes;
use futures_locks::RwLock;
use std::collections::HashMap;

/// Response bodies of successful requests, keyed by request URL.
///
/// Clones share the same storage. Entries never expire.
#[derive(Clone)]
pub struct ResponseCache {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        self.entries.read().await.get(key).cloned()
    }

    /// Look up an entry without waiting.
    ///
    /// Returns `None` both for a missing entry and when a writer holds the lock.
    pub fn try_get(&self, key: &str) -> Option<Bytes> {
        self.entries
            .try_read()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    pub async fn insert(&self, key: String, body: Bytes) {
        self.entries.write().await.insert(key, body);
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}
