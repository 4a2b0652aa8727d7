//! Persistence collaborators for diagram documents
//!
//! The document store never talks to a storage backend directly; it goes
//! through [`DocumentPersistence`]. Two implementations are provided: an
//! in-memory map and a directory of JSON files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{DiagramError, Result};
use crate::types::GraphDocument;

/// Storage backend for whole documents
#[async_trait]
pub trait DocumentPersistence: Send + Sync {
    /// Write the document, replacing any previous version with the same id
    async fn persist_document(&self, document: &GraphDocument) -> Result<()>;

    /// Read a document by id, `NotFound` if it was never persisted
    async fn load_document_by_id(&self, id: &str) -> Result<GraphDocument>;
}

/// Keeps documents in a map; contents are lost on drop
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    documents: RwLock<HashMap<String, GraphDocument>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// The stored copy of a document, if any
    pub fn get(&self, id: &str) -> Option<GraphDocument> {
        self.documents.read().get(id).cloned()
    }
}

#[async_trait]
impl DocumentPersistence for MemoryPersistence {
    async fn persist_document(&self, document: &GraphDocument) -> Result<()> {
        self.documents
            .write()
            .insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn load_document_by_id(&self, id: &str) -> Result<GraphDocument> {
        self.get(id)
            .ok_or_else(|| DiagramError::NotFound(format!("document '{}'", id)))
    }
}

/// Stores each document as `<id>.json` under a directory
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    root: PathBuf,
}

impl JsonFilePersistence {
    /// The directory is created on first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_for(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(DiagramError::invalid(format!(
                "document id '{}' is not a valid file name",
                id
            )));
        }
        Ok(self.root.join(format!("{}.json", id)))
    }
}

#[async_trait]
impl DocumentPersistence for JsonFilePersistence {
    async fn persist_document(&self, document: &GraphDocument) -> Result<()> {
        let file_path = self.file_for(&document.id)?;
        let content = serde_json::to_string_pretty(document)?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| DiagramError::persistence(format!("{}: {}", self.root.display(), e)))?;
        tokio::fs::write(&file_path, content)
            .await
            .map_err(|e| DiagramError::persistence(format!("{}: {}", file_path.display(), e)))?;

        log::debug!("Saved document '{}' to {:?}", document.id, file_path);
        Ok(())
    }

    async fn load_document_by_id(&self, id: &str) -> Result<GraphDocument> {
        let file_path = self.file_for(id)?;
        let content = match tokio::fs::read_to_string(&file_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DiagramError::NotFound(format!("document '{}'", id)));
            }
            Err(e) => {
                return Err(DiagramError::persistence(format!(
                    "{}: {}",
                    file_path.display(),
                    e
                )))
            }
        };

        let document: GraphDocument = serde_json::from_str(&content).map_err(|e| {
            DiagramError::persistence(format!("{}: {}", file_path.display(), e))
        })?;
        log::info!("Loaded document '{}' from {:?}", document.id, file_path);
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DiagramKind;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_round_trip() {
        let persistence = MemoryPersistence::new();
        let doc = GraphDocument::new(DiagramKind::MindMap, "ideas");

        persistence.persist_document(&doc).await.unwrap();
        assert_eq!(persistence.len(), 1);

        let loaded = persistence.load_document_by_id(&doc.id).await.unwrap();
        assert_eq!(loaded, doc);
    }

    #[tokio::test]
    async fn test_memory_missing_is_not_found() {
        let persistence = MemoryPersistence::new();
        let err = persistence.load_document_by_id("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let persistence = JsonFilePersistence::new(dir.path().join("docs"));
        let doc = GraphDocument::new(DiagramKind::Organogram, "team");

        persistence.persist_document(&doc).await.unwrap();
        assert!(dir.path().join("docs").join(format!("{}.json", doc.id)).exists());

        let loaded = persistence.load_document_by_id(&doc.id).await.unwrap();
        assert_eq!(loaded, doc);
    }

    #[tokio::test]
    async fn test_file_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let persistence = JsonFilePersistence::new(dir.path());
        let err = persistence.load_document_by_id("absent").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_file_corrupt_document_is_persistence_failure() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("broken.json"), "{ not json")
            .await
            .unwrap();
        let persistence = JsonFilePersistence::new(dir.path());

        let err = persistence.load_document_by_id("broken").await.unwrap_err();
        assert!(matches!(err, DiagramError::PersistenceFailure(_)));
    }

    #[tokio::test]
    async fn test_file_rejects_path_like_ids() {
        let dir = TempDir::new().unwrap();
        let persistence = JsonFilePersistence::new(dir.path());
        let err = persistence.load_document_by_id("../escape").await.unwrap_err();
        assert!(matches!(err, DiagramError::InvalidArgument(_)));
    }
}
