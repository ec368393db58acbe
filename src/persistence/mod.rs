//! # Persistence Module
//!
//! ## Why This Module Exists
//! Cloud login is split across two runs of the bridge: the first run asks for
//! an email code, the second one verifies it. The pending challenge and the
//! discovered device credentials therefore have to outlive the process. This
//! module owns that state behind a small key-value interface so the cloud
//! flow and the binary never touch the filesystem directly.
//!
//! ## Key Abstractions
//! - **[`KeyValueStore`]**: flat string-to-string store injected into the auth
//!   flow. Async so the file implementation can use `tokio::fs`.
//! - **[`TomlFileStore`]**: the store the bridge runs with, one TOML table on disk.
//! - **[`MemoryStore`]**: the same contract without I/O, used by tests.
//! - **[`credentials`]**: typed helpers for the challenge, the device list and
//!   the stored bridge version.
//!
//! ## Error Handling Strategy
//! Store failures surface as [`StoreError`]; callers decide whether they are
//! fatal. A missing state file is not an error, it is an empty store.

pub mod credentials;
pub mod file_store;

use std::collections::BTreeMap;
use std::future::Future;
use thiserror::Error;
use tokio::sync::RwLock;

pub use file_store::TomlFileStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("State file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to parse state file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("No home directory available for the state file")]
    NoHomeDir,
}

/// Flat persisted configuration, the way the host stores plugin settings.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn remove(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    fn entries(&self) -> impl Future<Output = Result<BTreeMap<String, String>, StoreError>> + Send;

    fn clear(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Volatile store. Loses everything with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.write().await.remove(key))
    }

    async fn entries(&self) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(self.entries.read().await.clone())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.entries.write().await.clear();
        Ok(())
    }
}
