//! Error types for the template service

use diagram_engine::DiagramError;
use thiserror::Error;

/// Result type alias using TemplateError
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Errors returned by template operations
#[derive(Debug, Error)]
pub enum TemplateError {
    /// No template (or usage record) with the given id
    #[error("Template not found: {0}")]
    NotFound(String),

    /// Malformed request, out-of-range rating, or unreadable import
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// System default templates cannot be removed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The key-value store rejected a read or write
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Applying a template to a document failed
    #[error("Document error: {0}")]
    Engine(#[from] DiagramError),
}

impl TemplateError {
    pub fn not_found(id: &str) -> Self {
        Self::NotFound(id.to_string())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::PersistenceFailure(msg.into())
    }
}
