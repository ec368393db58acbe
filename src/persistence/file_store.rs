use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{KeyValueStore, StoreError};

const STATE_DIR: &str = ".config/purelink-bridge";
const STATE_FILE: &str = "state.toml";

/// Key-value store persisted as a single flat TOML table.
///
/// The whole table is rewritten on every change. It holds a handful of keys
/// and changes only during cloud login, so there is no write batching.
#[derive(Debug)]
pub struct TomlFileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl TomlFileStore {
    /// `~/.config/purelink-bridge/state.toml`
    pub fn default_path() -> Result<PathBuf, StoreError> {
        let mut path = dirs::home_dir().ok_or(StoreError::NoHomeDir)?;
        path.push(STATE_DIR);
        path.push(STATE_FILE);
        Ok(path)
    }

    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read_to_string(&path).await?;
            let entries: BTreeMap<String, String> = toml::from_str(&content)?;
            info!("Loaded {} stored entries from {}", entries.len(), path.display());
            entries
        } else {
            warn!(
                "State file {} does not exist yet, starting empty",
                path.display()
            );
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !tokio::fs::try_exists(parent).await? {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = toml::to_string_pretty(entries)?;
        tokio::fs::write(&self.path, content).await?;
        debug!("State file {} written", self.path.display());
        Ok(())
    }
}

impl KeyValueStore for TomlFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.write().await;
        let removed = entries.remove(key);
        if removed.is_some() {
            self.flush(&entries).await?;
        }
        Ok(removed)
    }

    async fn entries(&self) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(self.entries.read().await.clone())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.clear();
        self.flush(&entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.toml");

        let store = TomlFileStore::open(&path).await.unwrap();
        store.set("0.name", "Living Room").await.unwrap();
        store.set("challenge_id", "abc-123").await.unwrap();
        assert_eq!(store.remove("challenge_id").await.unwrap().as_deref(), Some("abc-123"));
        drop(store);

        let reopened = TomlFileStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("0.name").await.unwrap().as_deref(),
            Some("Living Room")
        );
        assert_eq!(reopened.get("challenge_id").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlFileStore::open(dir.path().join("state.toml")).await.unwrap();
        assert!(store.entries().await.unwrap().is_empty());
    }
}
