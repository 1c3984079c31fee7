//! Per-user seen-alert tracking

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::warn;

use crate::error::Result;

use super::StateStore;

/// Default bound on persisted fingerprints per user
pub const DEFAULT_SEEN_CAPACITY: usize = 1000;

/// Insertion-ordered, bounded set of alert fingerprints
///
/// When the bound is exceeded the oldest entries are dropped first, so the
/// persisted set tracks the most recently seen alerts.
#[derive(Debug, Clone)]
pub struct SeenSet {
    order: VecDeque<String>,
    index: HashSet<String>,
    capacity: usize,
}

impl Default for SeenSet {
    fn default() -> Self {
        Self::new(DEFAULT_SEEN_CAPACITY)
    }
}

impl SeenSet {
    /// Create an empty set with the given bound
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            index: HashSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// Build a set from persisted entries, oldest first
    pub fn from_entries<I>(entries: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut set = Self::new(capacity);
        for entry in entries {
            set.insert(&entry);
        }
        set
    }

    /// Whether a fingerprint has been seen
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.index.contains(fingerprint)
    }

    /// Record a fingerprint as seen; returns false if it already was
    pub fn insert(&mut self, fingerprint: &str) -> bool {
        if !self.index.insert(fingerprint.to_string()) {
            return false;
        }
        self.order.push_back(fingerprint.to_string());
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.index.remove(&evicted);
            }
        }
        true
    }

    /// Number of tracked fingerprints
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entries in insertion order, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

/// Loads and persists one user's [`SeenSet`] through a [`StateStore`]
pub struct SeenStore {
    store: Arc<dyn StateStore>,
    key: String,
    capacity: usize,
}

impl SeenStore {
    /// Create a store handle for a user
    pub fn for_user(store: Arc<dyn StateStore>, user_id: i64, capacity: usize) -> Self {
        Self {
            store,
            key: format!("seen_alerts_{user_id}"),
            capacity,
        }
    }

    /// Load the persisted set; missing or corrupt state yields an empty set
    pub async fn load(&self) -> SeenSet {
        let raw = match self.store.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return SeenSet::new(self.capacity),
            Err(e) => {
                warn!(key = %self.key, error = %e, "failed to read seen-alert state");
                return SeenSet::new(self.capacity);
            }
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(entries) => SeenSet::from_entries(entries, self.capacity),
            Err(e) => {
                warn!(key = %self.key, error = %e, "discarding corrupt seen-alert state");
                SeenSet::new(self.capacity)
            }
        }
    }

    /// Persist the set as a JSON array of fingerprints
    pub async fn save(&self, set: &SeenSet) -> Result<()> {
        let entries: Vec<&str> = set.entries().collect();
        let raw = serde_json::to_string(&entries)?;
        self.store.put(&self.key, raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn insert_is_idempotent() {
        let mut set = SeenSet::new(10);
        assert!(set.insert("alert:1:1"));
        assert!(!set.insert("alert:1:1"));
        assert_eq!(set.len(), 1);
        assert!(set.contains("alert:1:1"));
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut set = SeenSet::new(3);
        for i in 0..5 {
            set.insert(&format!("alert:{i}:1"));
        }

        assert_eq!(set.len(), 3);
        assert!(!set.contains("alert:0:1"));
        assert!(!set.contains("alert:1:1"));
        assert!(set.contains("alert:2:1"));
        assert!(set.contains("alert:4:1"));
    }

    #[test]
    fn never_exceeds_persisted_bound() {
        let mut set = SeenSet::default();
        for i in 0..2500 {
            set.insert(&format!("alert:{i}:9"));
        }
        assert_eq!(set.len(), DEFAULT_SEEN_CAPACITY);
        // Oldest dropped first: the survivors are the newest 1000.
        assert!(!set.contains("alert:1499:9"));
        assert!(set.contains("alert:1500:9"));
        assert!(set.contains("alert:2499:9"));
    }

    #[tokio::test]
    async fn round_trips_through_store() {
        let store = Arc::new(MemoryStore::new());
        let seen_store = SeenStore::for_user(store, 42, 100);

        let mut set = SeenSet::new(100);
        set.insert("alert:7:3");
        set.insert("alert:8:3");
        seen_store.save(&set).await.unwrap();

        let loaded = seen_store.load().await;
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains("alert:7:3"));
        assert!(loaded.contains("alert:8:3"));
    }

    #[tokio::test]
    async fn corrupt_state_loads_empty() {
        let store = Arc::new(MemoryStore::new());
        store
            .put("seen_alerts_42", "not json".to_string())
            .await
            .unwrap();

        let seen_store = SeenStore::for_user(store.clone(), 42, 100);
        assert!(seen_store.load().await.is_empty());
    }

    #[tokio::test]
    async fn missing_state_loads_empty() {
        let store = Arc::new(MemoryStore::new());
        let seen_store = SeenStore::for_user(store, 42, 100);
        assert!(seen_store.load().await.is_empty());
    }
}
