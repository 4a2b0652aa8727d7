//! Error types for the diagram engine

use thiserror::Error;

/// Result type alias using DiagramError
pub type Result<T> = std::result::Result<T, DiagramError>;

/// Errors that can occur while editing a diagram document
#[derive(Debug, Error)]
pub enum DiagramError {
    /// A referenced node, edge or document does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request is malformed or violates a connection rule
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The request targets something that is structurally protected
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The persistence collaborator rejected a read or write
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DiagramError {
    pub fn node_not_found(id: &str) -> Self {
        Self::NotFound(format!("node '{}'", id))
    }

    pub fn edge_not_found(id: &str) -> Self {
        Self::NotFound(format!("edge '{}'", id))
    }

    /// Create an invalid argument error with a message
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a persistence failure with a message
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::PersistenceFailure(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
