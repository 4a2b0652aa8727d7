//! Diagram Engine - editable diagram documents
//!
//! This crate is the editing core for flowcharts, organization charts and
//! mind maps. It provides:
//!
//! - A typed node/edge model with category-specific payloads
//! - A document store with atomic mutations and change events
//! - Compressed snapshot-based undo/redo
//! - Connection validation with per-category cycle policy
//! - Obstacle-aware orthogonal connector routing
//!
//! # Architecture
//!
//! - `DocumentStore`: owns the live `GraphDocument`, its `History` and selection
//! - `NodeOperations`: composite edits (typed creation, clone, group, cascade delete)
//! - `RoutingEngine`: stateless path computation from node geometry
//! - `DocumentPersistence`: async storage collaborator used by save/load
//! - `EventSink`: change notifications for a rendering surface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use diagram_engine::{DocumentStore, MemoryPersistence, NodeCategory, NodeOperations, Position};
//!
//! let mut store = DocumentStore::new(Arc::new(MemoryPersistence::new()));
//! let root = NodeOperations::create_typed_node(
//!     &mut store,
//!     NodeCategory::MindMap,
//!     Position::new(0.0, 0.0),
//!     Default::default(),
//! )?;
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod operations;
pub mod persistence;
pub mod routing;
pub mod store;
pub mod types;
pub mod undo;
pub mod validation;

// Re-export key types
pub use config::{ConfigError, EditorConfig, ViewportConfig};
pub use error::{DiagramError, Result};
pub use events::{
    ChannelEventSink, DocumentEvent, EventError, EventSink, NullEventSink, VecEventSink,
};
pub use operations::{GroupResult, NodeOperations, TypedNodeOptions};
pub use persistence::{DocumentPersistence, JsonFilePersistence, MemoryPersistence};
pub use routing::{PathSegment, Route, RoutingEngine, RoutingOptions, SegmentDirection};
pub use store::{DocumentEditor, DocumentStore, RemovedNode, Selection};
pub use types::{
    ConnectionDirection, DiagramKind, Edge, EdgeData, EdgeKind, EdgePatch, EdgeStyle,
    FlowchartData, FlowchartShape, GraphDocument, GroupData, MindMapData, NewEdge, NewNode,
    Node, NodeCategory, NodeId, NodePatch, NodePayload, OrganogramData, PersonRecord, Position,
    Priority, ProcessType, Rect, Size, Viewport,
};
pub use undo::History;
pub use validation::{
    can_connect, validate_connection, validate_document, ConnectionPolicy, ConnectionRejection,
    CyclePolicy, Severity, ValidationIssue,
};
