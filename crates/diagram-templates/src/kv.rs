//! Key-value storage for template collections
//!
//! The service stores two independently serialized values: the template list
//! and the usage-stat list. Any backend that can get and set strings by key
//! will do.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Result, TemplateError};

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// `None` when the key was never written
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }
}

/// One file per key under a directory
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn file_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(TemplateError::invalid(format!(
                "'{}' is not a usable storage key",
                key
            )));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.file_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TemplateError::persistence(format!(
                "{}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let path = self.file_for(key)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| TemplateError::persistence(format!("{}: {}", self.root.display(), e)))?;
        tokio::fs::write(&path, value)
            .await
            .map_err(|e| TemplateError::persistence(format!("{}: {}", path.display(), e)))?;
        log::trace!("Wrote key '{}' to {:?}", key, path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_get_set() {
        let store = MemoryKeyValueStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v".to_string()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(dir.path().join("kv"));

        assert_eq!(store.get("templates").await.unwrap(), None);
        store.set("templates", "[]".to_string()).await.unwrap();
        assert_eq!(store.get("templates").await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(dir.path());
        let err = store.set("../x", String::new()).await.unwrap_err();
        assert!(matches!(err, TemplateError::InvalidArgument(_)));
    }
}
