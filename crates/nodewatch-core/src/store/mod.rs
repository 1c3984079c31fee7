//! Persisted client state
//!
//! The notification seen-set survives restarts through a small key-value
//! store. The store is an injected dependency so the tracking logic can be
//! tested without touching the filesystem.

mod file;
mod seen;

pub use file::JsonFileStore;
pub use seen::{SeenSet, SeenStore};

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;

/// String key-value persistence for client-side state
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the value stored under a key
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write the value stored under a key
    async fn put(&self, key: &str, value: String) -> Result<()>;
}

/// In-memory store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }
}
