//! File-backed key-value store

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

use super::StateStore;

/// Key-value store keeping one JSON file per key under a directory
///
/// Writes go through a temp file and rename so a crash mid-write leaves the
/// previous value intact. Concurrent processes are last-writer-wins.
pub struct JsonFileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open a store rooted at the given directory, creating it if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| Error::storage(format!("create {}: {e}", dir.display())))?;
        debug!(dir = %dir.display(), "opened state store");
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize(key)))
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        let _guard = self.lock.lock();
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage(format!("read {}: {e}", path.display()))),
        }
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let _guard = self.lock.lock();
        fs::write(&tmp, value)
            .map_err(|e| Error::storage(format!("write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path)
            .map_err(|e| Error::storage(format!("rename {}: {e}", path.display())))?;
        Ok(())
    }
}

/// Keep keys filesystem-safe
fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn round_trips_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        store
            .put("seen_alerts_42", "[\"alert:1:2\"]".to_string())
            .await
            .unwrap();

        let value = store.get("seen_alerts_42").await.unwrap();
        assert_eq!(value.as_deref(), Some("[\"alert:1:2\"]"));
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert_eq!(store.get("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn overwrites_existing_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        store.put("k", "old".to_string()).await.unwrap();
        store.put("k", "new".to_string()).await.unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn sanitizes_hostile_keys() {
        assert_eq!(sanitize("seen_alerts_42"), "seen_alerts_42");
        assert_eq!(sanitize("../escape"), "___escape");
    }
}
