//! Diagram Templates - reusable diagram snippets
//!
//! A catalog of detached node/edge subgraphs that can be captured from a
//! document, searched, exchanged as portable JSON, and applied back into a
//! [`diagram_engine::DocumentStore`] as a single undoable edit.
//!
//! # Architecture
//!
//! - `TemplateService`: catalog operations, write-through persistence
//! - `KeyValueStore`: async string storage for the template and usage collections
//! - `thumbnail`: SVG previews synthesized from node geometry
//! - `defaults`: system templates seeded on startup

pub mod config;
pub mod constants;
pub mod defaults;
pub mod error;
pub mod kv;
pub mod service;
pub mod thumbnail;
pub mod types;

pub use config::{ConfigError, TemplateServiceConfig};
pub use error::{Result, TemplateError};
pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use service::TemplateService;
pub use types::{
    Difficulty, ExportedTemplate, NewTemplate, Template, TemplateCategory, TemplateFilters,
    TemplateId, TemplateMetadata, TemplatePage, TemplatePatch, TemplateUsageStat,
};
