//! The document store: single source of truth for one editing session
//!
//! Every mutation is applied to a draft copy of the document through a
//! [`DocumentEditor`]. If the edit succeeds, the pre-mutation document is
//! recorded in history and the draft replaces it; if it fails, the draft is
//! dropped and nothing (document, history, flags) changes.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use diagram_engine::{DocumentStore, MemoryPersistence, NewNode, NewEdge};
//!
//! let mut store = DocumentStore::new(Arc::new(MemoryPersistence::new()));
//! let a = store.add_node(NewNode::new("Start", Position::new(0.0, 0.0), payload))?;
//! let b = store.add_node(NewNode::new("Review", Position::new(300.0, 0.0), payload))?;
//! store.add_edge(NewEdge::new(&a.id, &b.id))?;
//! store.undo()?;
//! store.save().await?;
//! ```

use std::sync::Arc;

use chrono::Utc;

use crate::config::EditorConfig;
use crate::error::{DiagramError, Result};
use crate::events::{DocumentEvent, EventSink, NullEventSink};
use crate::persistence::DocumentPersistence;
use crate::routing::{Route, RoutingEngine};
use crate::types::{
    DiagramKind, Edge, EdgeId, EdgePatch, GraphDocument, NewEdge, NewNode, Node, NodeId,
    NodePatch, NodePayload, Position, Viewport,
};
use crate::undo::History;
use crate::validation::{
    can_connect, validate_connection, validate_document, ConnectionPolicy, ConnectionRejection,
    ValidationIssue,
};

/// A node removed together with the edges that touched it
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedNode {
    pub node: Node,
    pub edges: Vec<Edge>,
}

/// Currently selected elements; not part of the document or its history
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn primary_node(&self) -> Option<&str> {
        self.nodes.first().map(String::as_str)
    }

    fn retain_existing(&mut self, doc: &GraphDocument) -> bool {
        let before = (self.nodes.len(), self.edges.len());
        self.nodes.retain(|id| doc.contains_node(id));
        self.edges.retain(|id| doc.find_edge(id).is_some());
        before != (self.nodes.len(), self.edges.len())
    }
}

// ─── EDITOR ─────────────────────────────────────────────────────────────────

/// Mutation primitives over a draft document
///
/// Obtained through [`DocumentStore::batch`]. Each primitive validates
/// before touching the draft, so a failed call leaves it unchanged.
pub struct DocumentEditor<'a> {
    doc: &'a mut GraphDocument,
    routing: &'a RoutingEngine,
    policy: &'a ConnectionPolicy,
    auto_route: bool,
    events: Vec<DocumentEvent>,
}

impl<'a> DocumentEditor<'a> {
    fn new(
        doc: &'a mut GraphDocument,
        routing: &'a RoutingEngine,
        policy: &'a ConnectionPolicy,
        auto_route: bool,
    ) -> Self {
        Self {
            doc,
            routing,
            policy,
            auto_route,
            events: Vec::new(),
        }
    }

    /// The draft as edited so far
    pub fn document(&self) -> &GraphDocument {
        self.doc
    }

    pub fn add_node(&mut self, spec: NewNode) -> Result<Node> {
        if let Some(id) = &spec.id {
            if self.doc.contains_node(id) {
                return Err(DiagramError::invalid(format!("node id '{}' already exists", id)));
            }
        }

        let mut node = Node::new(spec.label, spec.position, spec.data);
        if let Some(id) = spec.id {
            node.id = id;
        }
        node.size = spec.size;

        log::debug!("Adding {} node '{}'", node.category(), node.id);
        self.doc.nodes.push(node.clone());
        self.events.push(DocumentEvent::NodeAdded {
            node_id: node.id.clone(),
        });
        Ok(node)
    }

    pub fn update_node(&mut self, id: &str, patch: NodePatch) -> Result<Node> {
        let moves = patch.moves();
        let node = self
            .doc
            .find_node_mut(id)
            .ok_or_else(|| DiagramError::node_not_found(id))?;

        if let Some(label) = patch.label {
            node.label = label;
        }
        if let Some(position) = patch.position {
            node.position = position;
        }
        if let Some(size) = patch.size {
            node.size = size;
        }
        if let Some(data) = patch.data {
            node.data = data;
        }
        node.version += 1;
        node.updated_at = Utc::now();
        let updated = node.clone();

        self.events.push(DocumentEvent::NodeUpdated {
            node_id: updated.id.clone(),
        });
        if moves && self.auto_route {
            self.reroute_incident(id);
        }
        Ok(updated)
    }

    /// Remove a node and every edge touching it
    ///
    /// Organogram root positions are protected and cannot be deleted.
    pub fn delete_node(&mut self, id: &str) -> Result<RemovedNode> {
        let node = self
            .doc
            .find_node(id)
            .ok_or_else(|| DiagramError::node_not_found(id))?;
        if node.is_organogram_root() {
            return Err(DiagramError::Forbidden(format!(
                "node '{}' is the root of the organization chart",
                id
            )));
        }

        let (edges, kept): (Vec<Edge>, Vec<Edge>) =
            self.doc.edges.drain(..).partition(|e| e.touches(id));
        self.doc.edges = kept;
        for edge in &edges {
            self.events.push(DocumentEvent::EdgeRemoved {
                edge_id: edge.id.clone(),
            });
        }

        let index = self
            .doc
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| DiagramError::node_not_found(id))?;
        let node = self.doc.nodes.remove(index);

        // Drop dangling references held in payloads
        for other in &mut self.doc.nodes {
            match &mut other.data {
                NodePayload::Group(group) => group.member_ids.retain(|m| m != id),
                NodePayload::MindMap(topic) => topic.related_node_ids.retain(|r| r != id),
                NodePayload::Flowchart(_) | NodePayload::Organogram(_) => {}
            }
        }

        log::debug!("Removed node '{}' and {} edge(s)", id, edges.len());
        self.events.push(DocumentEvent::NodeRemoved {
            node_id: node.id.clone(),
        });
        Ok(RemovedNode { node, edges })
    }

    /// Add an edge after running the connection pre-checks
    pub fn add_edge(&mut self, spec: NewEdge) -> Result<Edge> {
        validate_connection(self.doc, &spec.source, &spec.target, self.policy)?;
        if let Some(id) = &spec.id {
            if self.doc.find_edge(id).is_some() {
                return Err(DiagramError::invalid(format!("edge id '{}' already exists", id)));
            }
        }

        let mut edge = Edge::new(spec.source, spec.target);
        if let Some(id) = spec.id {
            edge.id = id;
        }
        edge.source_handle = spec.source_handle;
        edge.target_handle = spec.target_handle;
        edge.kind = spec.kind;
        edge.data = spec.data;

        if self.auto_route {
            if let Some(route) = self.routing.route_edge(self.doc, &edge) {
                route.apply_to(&mut edge);
            }
        }

        log::debug!("Adding edge '{}' ({} -> {})", edge.id, edge.source, edge.target);
        self.doc.edges.push(edge.clone());
        self.events.push(DocumentEvent::EdgeAdded {
            edge_id: edge.id.clone(),
        });
        Ok(edge)
    }

    pub fn update_edge(&mut self, id: &str, patch: EdgePatch) -> Result<Edge> {
        let reroute = patch.kind.is_some();
        let edge = self
            .doc
            .find_edge_mut(id)
            .ok_or_else(|| DiagramError::edge_not_found(id))?;

        if let Some(label) = patch.label {
            edge.data.label = label;
        }
        if let Some(kind) = patch.kind {
            edge.kind = kind;
        }
        if let Some(style) = patch.style {
            edge.data.style = style;
        }
        if let Some(animated) = patch.animated {
            edge.data.animated = animated;
        }
        if let Some(handle) = patch.source_handle {
            edge.source_handle = handle;
        }
        if let Some(handle) = patch.target_handle {
            edge.target_handle = handle;
        }
        edge.version += 1;
        edge.updated_at = Utc::now();
        let mut updated = edge.clone();

        if reroute && self.auto_route {
            if let Some(route) = self.routing.route_edge(self.doc, &updated) {
                route.apply_to(&mut updated);
                if let Some(edge) = self.doc.find_edge_mut(id) {
                    edge.data = updated.data.clone();
                }
            }
        }

        self.events.push(DocumentEvent::EdgeUpdated {
            edge_id: updated.id.clone(),
        });
        Ok(updated)
    }

    pub fn delete_edge(&mut self, id: &str) -> Result<Edge> {
        let index = self
            .doc
            .edges
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| DiagramError::edge_not_found(id))?;
        let edge = self.doc.edges.remove(index);

        self.events.push(DocumentEvent::EdgeRemoved {
            edge_id: edge.id.clone(),
        });
        Ok(edge)
    }

    /// Recompute cached geometry of every edge; returns the number routed
    pub fn reroute_all(&mut self) -> usize {
        let count = self.routing.route_all(self.doc);
        for edge in &self.doc.edges {
            self.events.push(DocumentEvent::EdgeUpdated {
                edge_id: edge.id.clone(),
            });
        }
        count
    }

    fn reroute_incident(&mut self, node_id: &str) {
        let incident: Vec<usize> = self
            .doc
            .edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.touches(node_id))
            .map(|(i, _)| i)
            .collect();

        for i in incident {
            let Some(route) = self.routing.route_edge(self.doc, &self.doc.edges[i]) else {
                continue;
            };
            route.apply_to(&mut self.doc.edges[i]);
            self.events.push(DocumentEvent::EdgeUpdated {
                edge_id: self.doc.edges[i].id.clone(),
            });
        }
    }
}

// ─── STORE ──────────────────────────────────────────────────────────────────

/// Owns the live document, its history and the current selection
pub struct DocumentStore {
    document: GraphDocument,
    history: History,
    selection: Selection,
    persistence: Arc<dyn DocumentPersistence>,
    events: Arc<dyn EventSink>,
    routing: RoutingEngine,
    config: EditorConfig,
}

impl DocumentStore {
    /// Create a store holding an empty flowchart
    pub fn new(persistence: Arc<dyn DocumentPersistence>) -> Self {
        let config = EditorConfig::default();
        Self {
            document: GraphDocument::new(DiagramKind::Flowchart, "Untitled"),
            history: History::new(config.history_limit)
                .with_compression_level(config.snapshot_compression_level),
            selection: Selection::default(),
            persistence,
            events: Arc::new(NullEventSink),
            routing: RoutingEngine::new(config.routing.clone()),
            config,
        }
    }

    /// Replace the configuration; clears history
    pub fn with_config(mut self, config: EditorConfig) -> Self {
        self.history = History::new(config.history_limit)
            .with_compression_level(config.snapshot_compression_level);
        self.routing = RoutingEngine::new(config.routing.clone());
        self.config = config;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    // ─── ACCESS ─────────────────────────────────────────────────────────────

    pub fn document(&self) -> &GraphDocument {
        &self.document
    }

    pub fn nodes(&self) -> &[Node] {
        &self.document.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.document.edges
    }

    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.document.find_node(id)
    }

    pub fn find_edge(&self, id: &str) -> Option<&Edge> {
        self.document.find_edge(id)
    }

    /// Whether there are edits not yet persisted
    pub fn is_dirty(&self) -> bool {
        self.document.unsaved
    }

    pub fn version(&self) -> u64 {
        self.document.version
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn routing(&self) -> &RoutingEngine {
        &self.routing
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    // ─── LIFECYCLE ──────────────────────────────────────────────────────────

    /// Start editing `document`; history and selection are reset
    ///
    /// Edges whose source or target is missing from the node set are dropped.
    pub fn load(&mut self, mut document: GraphDocument) {
        let dangling: Vec<EdgeId> = document.dangling_edges().map(|e| e.id.clone()).collect();
        if !dangling.is_empty() {
            log::warn!(
                "Dropping {} dangling edge(s) from document '{}': {:?}",
                dangling.len(),
                document.id,
                dangling
            );
            document.edges.retain(|e| !dangling.contains(&e.id));
        }
        document.unsaved = false;
        log::info!(
            "Loaded document '{}' ({} nodes, {} edges)",
            document.id,
            document.nodes.len(),
            document.edges.len()
        );
        self.document = document;
        self.history.clear();
        self.selection = Selection::default();
        self.emit(DocumentEvent::DocumentLoaded {
            document_id: self.document.id.clone(),
        });
    }

    /// Fetch a document from the persistence collaborator and load it
    pub async fn load_by_id(&mut self, id: &str) -> Result<()> {
        let document = self.persistence.load_document_by_id(id).await?;
        self.load(document);
        Ok(())
    }

    /// Start a fresh, empty document
    pub fn create_new(&mut self, kind: DiagramKind, title: impl Into<String>) -> &GraphDocument {
        self.load(GraphDocument::new(kind, title));
        &self.document
    }

    /// Persist the current document
    ///
    /// On success the unsaved flag is cleared. On failure the error is
    /// returned and the in-memory document is left exactly as it was.
    pub async fn save(&mut self) -> Result<()> {
        if let Err(e) = self.persistence.persist_document(&self.document).await {
            log::warn!("Failed to save document '{}': {}", self.document.id, e);
            return Err(match e {
                DiagramError::PersistenceFailure(_) => e,
                other => DiagramError::persistence(other.to_string()),
            });
        }

        self.document.unsaved = false;
        log::info!(
            "Saved document '{}' at version {}",
            self.document.id,
            self.document.version
        );
        self.emit(DocumentEvent::DocumentSaved {
            document_id: self.document.id.clone(),
            version: self.document.version,
        });
        Ok(())
    }

    // ─── MUTATIONS ──────────────────────────────────────────────────────────

    /// Apply one or more edits atomically as a single undo step
    ///
    /// The closure works on a draft. If it returns an error the draft is
    /// discarded; if it makes no change nothing is recorded.
    pub fn batch<T, F>(&mut self, edit: F) -> Result<T>
    where
        F: FnOnce(&mut DocumentEditor<'_>) -> Result<T>,
    {
        let mut draft = self.document.clone();
        let (value, events) = {
            let mut editor = DocumentEditor::new(
                &mut draft,
                &self.routing,
                &self.config.connections,
                self.config.auto_route,
            );
            let value = edit(&mut editor)?;
            (value, editor.events)
        };

        if events.is_empty() {
            return Ok(value);
        }

        self.history.record(&self.document)?;
        draft.version = self.document.version + 1;
        draft.unsaved = true;
        draft.updated_at = Utc::now();
        self.document = draft;

        for event in events {
            self.emit(event);
        }
        self.after_content_change();
        Ok(value)
    }

    pub fn add_node(&mut self, spec: NewNode) -> Result<Node> {
        self.batch(|editor| editor.add_node(spec))
    }

    pub fn update_node(&mut self, id: &str, patch: NodePatch) -> Result<Node> {
        self.batch(|editor| editor.update_node(id, patch))
    }

    /// Delete a node, cascading to every edge that touches it
    pub fn delete_node(&mut self, id: &str) -> Result<RemovedNode> {
        self.batch(|editor| editor.delete_node(id))
    }

    pub fn add_edge(&mut self, spec: NewEdge) -> Result<Edge> {
        self.batch(|editor| editor.add_edge(spec))
    }

    pub fn update_edge(&mut self, id: &str, patch: EdgePatch) -> Result<Edge> {
        self.batch(|editor| editor.update_edge(id, patch))
    }

    pub fn delete_edge(&mut self, id: &str) -> Result<Edge> {
        self.batch(|editor| editor.delete_edge(id))
    }

    /// Recompute the geometry of every edge as one undo step
    pub fn reroute_all_edges(&mut self) -> Result<usize> {
        self.batch(|editor| Ok(editor.reroute_all()))
    }

    // ─── HISTORY ────────────────────────────────────────────────────────────

    /// Returns false when there was nothing to undo
    pub fn undo(&mut self) -> Result<bool> {
        match self.history.undo(&self.document) {
            None => Ok(false),
            Some(Err(e)) => Err(e),
            Some(Ok(restored)) => {
                self.restore(restored);
                Ok(true)
            }
        }
    }

    /// Returns false when there was nothing to redo
    pub fn redo(&mut self) -> Result<bool> {
        match self.history.redo(&self.document) {
            None => Ok(false),
            Some(Err(e)) => Err(e),
            Some(Ok(restored)) => {
                self.restore(restored);
                Ok(true)
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Number of undo steps available
    pub fn history_len(&self) -> usize {
        self.history.past_len()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.emit_history();
    }

    fn restore(&mut self, mut restored: GraphDocument) {
        // The viewport is not part of history
        restored.viewport = self.document.viewport;
        restored.version = self.document.version + 1;
        restored.unsaved = true;
        restored.updated_at = Utc::now();
        self.document = restored;
        self.after_content_change();
    }

    fn after_content_change(&mut self) {
        if self.selection.retain_existing(&self.document) {
            self.emit_selection();
        }
        self.emit_history();
    }

    // ─── SELECTION ──────────────────────────────────────────────────────────

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Selected nodes in selection order
    pub fn selected_nodes(&self) -> Vec<&Node> {
        self.selection
            .nodes
            .iter()
            .filter_map(|id| self.document.find_node(id))
            .collect()
    }

    pub fn selected_edges(&self) -> Vec<&Edge> {
        self.selection
            .edges
            .iter()
            .filter_map(|id| self.document.find_edge(id))
            .collect()
    }

    /// Select exactly one node, or clear the selection with `None`
    pub fn set_selected_node(&mut self, id: Option<&str>) -> Result<()> {
        match id {
            None => self.clear_selection(),
            Some(id) => self.select_node(id, false)?,
        }
        Ok(())
    }

    /// Select a node; with `multi` the node is added to the selection
    pub fn select_node(&mut self, id: &str, multi: bool) -> Result<()> {
        if !self.document.contains_node(id) {
            return Err(DiagramError::node_not_found(id));
        }
        if !multi {
            self.selection = Selection::default();
        }
        if !self.selection.nodes.iter().any(|n| n == id) {
            self.selection.nodes.push(id.to_string());
        }
        self.emit_selection();
        Ok(())
    }

    pub fn select_edge(&mut self, id: &str, multi: bool) -> Result<()> {
        if self.document.find_edge(id).is_none() {
            return Err(DiagramError::edge_not_found(id));
        }
        if !multi {
            self.selection = Selection::default();
        }
        if !self.selection.edges.iter().any(|e| e == id) {
            self.selection.edges.push(id.to_string());
        }
        self.emit_selection();
        Ok(())
    }

    pub fn deselect_node(&mut self, id: &str) {
        let before = self.selection.nodes.len();
        self.selection.nodes.retain(|n| n != id);
        if self.selection.nodes.len() != before {
            self.emit_selection();
        }
    }

    pub fn select_all(&mut self) {
        self.selection = Selection {
            nodes: self.document.nodes.iter().map(|n| n.id.clone()).collect(),
            edges: self.document.edges.iter().map(|e| e.id.clone()).collect(),
        };
        self.emit_selection();
    }

    pub fn clear_selection(&mut self) {
        if !self.selection.is_empty() {
            self.selection = Selection::default();
            self.emit_selection();
        }
    }

    // ─── VIEWPORT ───────────────────────────────────────────────────────────

    pub fn viewport(&self) -> Viewport {
        self.document.viewport
    }

    /// Replace the viewport; zoom is clamped. Not recorded in history.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        let viewport = Viewport {
            zoom: self.config.viewport.clamp_zoom(viewport.zoom),
            ..viewport
        };
        if viewport == self.document.viewport {
            return;
        }
        self.document.viewport = viewport;
        self.document.version += 1;
        self.document.unsaved = true;
        self.emit(DocumentEvent::ViewportChanged { viewport });
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        let viewport = Viewport {
            zoom,
            ..self.document.viewport
        };
        self.set_viewport(viewport);
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.document.viewport.zoom * self.config.viewport.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.document.viewport.zoom / self.config.viewport.zoom_step);
    }

    pub fn reset_zoom(&mut self) {
        self.set_viewport(Viewport::default());
    }

    /// Pan so that `point` sits in the middle of the reference canvas
    pub fn center_on(&mut self, point: Position) {
        let zoom = self.document.viewport.zoom;
        let fit = &self.config.viewport;
        let viewport = Viewport {
            x: fit.fit_width / 2.0 - point.x * zoom,
            y: fit.fit_height / 2.0 - point.y * zoom,
            zoom,
        };
        self.set_viewport(viewport);
    }

    /// Zoom and pan so every node fits the reference canvas
    pub fn fit_to_screen(&mut self) {
        let Some(bounds) = self.document.bounds() else {
            self.reset_zoom();
            return;
        };
        let fit = &self.config.viewport;
        let zoom = fit.clamp_zoom(
            (fit.fit_width / (bounds.width() + 2.0 * fit.fit_padding))
                .min(fit.fit_height / (bounds.height() + 2.0 * fit.fit_padding)),
        );
        let center = bounds.center();
        let viewport = Viewport {
            x: fit.fit_width / 2.0 - center.x * zoom,
            y: fit.fit_height / 2.0 - center.y * zoom,
            zoom,
        };
        self.set_viewport(viewport);
    }

    // ─── QUERIES ────────────────────────────────────────────────────────────

    pub fn validate_connection(
        &self,
        source: &str,
        target: &str,
    ) -> std::result::Result<(), ConnectionRejection> {
        validate_connection(&self.document, source, target, &self.config.connections)
    }

    pub fn can_connect(&self, candidate: &NewEdge) -> bool {
        can_connect(&self.document, candidate, &self.config.connections)
    }

    /// Route between two nodes of the document
    pub fn generate_route(&self, source: &str, target: &str) -> Result<Route> {
        let source = self
            .find_node(source)
            .ok_or_else(|| DiagramError::node_not_found(source))?;
        let target = self
            .find_node(target)
            .ok_or_else(|| DiagramError::node_not_found(target))?;
        Ok(self
            .routing
            .generate_route(source, target, &self.document.nodes))
    }

    pub fn validate(&self) -> Vec<ValidationIssue> {
        validate_document(&self.document, &self.config.connections)
    }

    // ─── EVENTS ─────────────────────────────────────────────────────────────

    fn emit(&self, event: DocumentEvent) {
        if let Err(e) = self.events.send(event) {
            log::warn!("Failed to deliver document event: {}", e);
        }
    }

    fn emit_history(&self) {
        self.emit(DocumentEvent::HistoryChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            version: self.document.version,
        });
    }

    fn emit_selection(&self) {
        self.emit(DocumentEvent::SelectionChanged {
            node_ids: self.selection.nodes.clone(),
            edge_ids: self.selection.edges.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::VecEventSink;
    use crate::persistence::MemoryPersistence;
    use crate::types::{EdgeKind, FlowchartData, OrganogramData};
    use async_trait::async_trait;

    fn store() -> DocumentStore {
        DocumentStore::new(Arc::new(MemoryPersistence::new()))
    }

    fn process(id: &str, x: f64, y: f64) -> NewNode {
        NewNode::new(
            id,
            Position::new(x, y),
            NodePayload::Flowchart(FlowchartData::default()),
        )
        .with_id(id)
    }

    struct FailingPersistence;

    #[async_trait]
    impl DocumentPersistence for FailingPersistence {
        async fn persist_document(&self, _document: &GraphDocument) -> Result<()> {
            Err(DiagramError::persistence("disk full"))
        }

        async fn load_document_by_id(&self, id: &str) -> Result<GraphDocument> {
            Err(DiagramError::NotFound(id.to_string()))
        }
    }

    #[test]
    fn test_mutation_bumps_version_and_records_history() {
        let mut store = store();
        assert!(!store.is_dirty());

        store.add_node(process("a", 0.0, 0.0)).unwrap();
        assert_eq!(store.version(), 1);
        assert!(store.is_dirty());
        assert!(store.can_undo());
        assert!(!store.can_redo());
    }

    #[test]
    fn test_delete_node_cascades_edges() {
        let mut store = store();
        store.add_node(process("a", 0.0, 0.0)).unwrap();
        store.add_node(process("b", 300.0, 0.0)).unwrap();
        store.add_node(process("c", 0.0, 300.0)).unwrap();
        store.add_edge(NewEdge::new("a", "b")).unwrap();
        store.add_edge(NewEdge::new("b", "c")).unwrap();
        store.add_edge(NewEdge::new("a", "c")).unwrap();

        let removed = store.delete_node("b").unwrap();
        assert_eq!(removed.edges.len(), 2);
        assert_eq!(store.edges().len(), 1);
        assert_eq!(store.document().dangling_edges().count(), 0);
    }

    #[test]
    fn test_missing_ids_fail_without_history() {
        let mut store = store();
        store.add_node(process("a", 0.0, 0.0)).unwrap();
        let version = store.version();
        let depth = store.history().past_len();

        let err = store.add_edge(NewEdge::new("a", "ghost")).unwrap_err();
        assert!(err.is_not_found());
        let err = store
            .update_node("ghost", NodePatch::label("x"))
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(store.delete_edge("ghost").unwrap_err().is_not_found());

        assert_eq!(store.version(), version);
        assert_eq!(store.history().past_len(), depth);
    }

    #[test]
    fn test_rejected_connections_leave_document_untouched() {
        let mut store = store();
        store.add_node(process("a", 0.0, 0.0)).unwrap();
        store.add_node(process("b", 300.0, 0.0)).unwrap();
        store.add_edge(NewEdge::new("a", "b")).unwrap();
        let before = store.document().clone();

        assert!(matches!(
            store.add_edge(NewEdge::new("a", "a")),
            Err(DiagramError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.add_edge(NewEdge::new("a", "b")),
            Err(DiagramError::InvalidArgument(_))
        ));
        assert_eq!(store.document(), &before);
    }

    #[test]
    fn test_n_mutations_then_n_undos_restore_original() {
        let mut store = store();
        let original = store.document().clone();

        store.add_node(process("a", 0.0, 0.0)).unwrap();
        store.add_node(process("b", 300.0, 0.0)).unwrap();
        store.add_edge(NewEdge::new("a", "b").with_id("ab")).unwrap();
        store
            .update_node("a", NodePatch::position(Position::new(0.0, 100.0)))
            .unwrap();
        store.delete_edge("ab").unwrap();

        for _ in 0..5 {
            assert!(store.undo().unwrap());
        }
        assert!(store.document().same_content(&original));
        assert!(!store.undo().unwrap());
    }

    #[test]
    fn test_redo_after_new_mutation_is_noop() {
        let mut store = store();
        store.add_node(process("a", 0.0, 0.0)).unwrap();
        store.add_node(process("b", 300.0, 0.0)).unwrap();

        store.undo().unwrap();
        store.add_node(process("c", 0.0, 300.0)).unwrap();
        let before = store.document().clone();

        assert!(!store.redo().unwrap());
        assert_eq!(store.document(), &before);
    }

    #[test]
    fn test_undo_keeps_current_viewport() {
        let mut store = store();
        store.add_node(process("a", 0.0, 0.0)).unwrap();
        store.zoom_in();
        let zoomed = store.viewport();

        assert!(store.undo().unwrap());
        assert!(store.nodes().is_empty());
        assert_eq!(store.viewport(), zoomed);

        assert!(store.redo().unwrap());
        assert_eq!(store.viewport(), zoomed);
    }

    #[test]
    fn test_load_drops_dangling_edges() {
        let mut document = GraphDocument::new(DiagramKind::Flowchart, "Imported");
        let step = || NodePayload::Flowchart(FlowchartData::default());
        let a = Node::new("a", Position::default(), step());
        let b = Node::new("b", Position::new(300.0, 0.0), step());
        let kept = Edge::new(a.id.clone(), b.id.clone());
        document.edges.push(Edge::new(a.id.clone(), "ghost"));
        document.edges.push(kept.clone());
        document.nodes.extend([a, b]);

        let mut store = store();
        store.load(document);

        assert_eq!(store.document().dangling_edges().count(), 0);
        assert_eq!(store.edges().len(), 1);
        assert_eq!(store.edges()[0].id, kept.id);
    }

    #[tokio::test]
    async fn test_load_by_id_drops_dangling_edges() {
        let persistence = Arc::new(MemoryPersistence::new());
        let mut document = GraphDocument::new(DiagramKind::Flowchart, "Stored");
        let a = Node::new(
            "a",
            Position::default(),
            NodePayload::Flowchart(FlowchartData::default()),
        );
        document.edges.push(Edge::new("ghost", a.id.clone()));
        document.nodes.push(a);
        persistence.persist_document(&document).await.unwrap();

        let mut store = DocumentStore::new(persistence);
        store.load_by_id(&document.id).await.unwrap();
        assert_eq!(store.nodes().len(), 1);
        assert!(store.edges().is_empty());
    }

    #[test]
    fn test_undo_then_redo() {
        let mut store = store();
        store.add_node(process("a", 0.0, 0.0)).unwrap();
        let after_add = store.document().clone();

        store.undo().unwrap();
        assert!(store.nodes().is_empty());
        assert!(store.redo().unwrap());
        assert!(store.document().same_content(&after_add));
    }

    #[test]
    fn test_history_limit_applies() {
        let config = EditorConfig {
            history_limit: 2,
            ..Default::default()
        };
        let mut store = store().with_config(config);
        for i in 0..4 {
            store
                .add_node(process(&format!("n{}", i), i as f64 * 200.0, 0.0))
                .unwrap();
        }
        assert_eq!(store.history_len(), 2);
    }

    #[test]
    fn test_edges_are_routed_on_connect_and_move() {
        let mut store = store();
        store.add_node(process("a", 0.0, 0.0)).unwrap();
        store.add_node(process("b", 300.0, 0.0)).unwrap();
        let edge = store.add_edge(NewEdge::new("a", "b")).unwrap();
        assert_eq!(edge.data.path.as_deref(), Some("M 150 40 L 300 40"));

        store
            .update_node("b", NodePatch::position(Position::new(300.0, 200.0)))
            .unwrap();
        let moved = store.find_edge(&edge.id).unwrap();
        assert_ne!(moved.data.path.as_deref(), Some("M 150 40 L 300 40"));
        assert_eq!(store.history().past_len(), 4);
    }

    #[test]
    fn test_straight_edges_skip_orthogonal_routing() {
        let mut store = store();
        store.add_node(process("a", 0.0, 0.0)).unwrap();
        store.add_node(process("b", 400.0, 200.0)).unwrap();
        let edge = store
            .add_edge(NewEdge::new("a", "b").with_kind(EdgeKind::Straight))
            .unwrap();
        let path = edge.data.path.unwrap();
        assert_eq!(path.matches(" L ").count(), 1);
    }

    #[test]
    fn test_organogram_root_is_protected() {
        let mut store = store();
        store
            .add_node(
                NewNode::new(
                    "CEO",
                    Position::default(),
                    NodePayload::Organogram(OrganogramData::default()),
                )
                .with_id("ceo"),
            )
            .unwrap();
        assert!(matches!(
            store.delete_node("ceo"),
            Err(DiagramError::Forbidden(_))
        ));
        assert_eq!(store.nodes().len(), 1);
    }

    #[test]
    fn test_batch_is_atomic() {
        let mut store = store();
        store.add_node(process("a", 0.0, 0.0)).unwrap();
        let before = store.document().clone();
        let depth = store.history().past_len();

        let result = store.batch(|editor| {
            editor.add_node(process("b", 300.0, 0.0))?;
            editor.add_edge(NewEdge::new("a", "ghost"))
        });
        assert!(result.is_err());
        assert_eq!(store.document(), &before);
        assert_eq!(store.history().past_len(), depth);

        store
            .batch(|editor| {
                editor.add_node(process("b", 300.0, 0.0))?;
                editor.add_edge(NewEdge::new("a", "b"))
            })
            .unwrap();
        assert_eq!(store.history().past_len(), depth + 1);
        store.undo().unwrap();
        assert_eq!(store.nodes().len(), 1);
    }

    #[test]
    fn test_selection_follows_deletes() {
        let mut store = store();
        store.add_node(process("a", 0.0, 0.0)).unwrap();
        store.add_node(process("b", 300.0, 0.0)).unwrap();

        store.set_selected_node(Some("a")).unwrap();
        store.select_node("b", true).unwrap();
        assert_eq!(store.selection().nodes, vec!["a", "b"]);

        store.delete_node("a").unwrap();
        assert_eq!(store.selection().nodes, vec!["b"]);
        let selected: Vec<&str> = store
            .selected_nodes()
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(selected, vec!["b"]);
        assert!(store.selected_edges().is_empty());

        store.set_selected_node(None).unwrap();
        assert!(store.selection().is_empty());
        assert!(store.set_selected_node(Some("ghost")).is_err());

        store.select_all();
        assert_eq!(store.selection().primary_node(), Some("b"));
        store.clear_selection();
        assert!(store.selection().is_empty());
    }

    #[test]
    fn test_viewport_operations() {
        let mut store = store();
        let depth = store.history().past_len();

        store.zoom_in();
        assert!((store.viewport().zoom - 1.2).abs() < 1e-9);
        store.set_zoom(100.0);
        assert_eq!(store.viewport().zoom, 3.0);
        store.reset_zoom();
        assert_eq!(store.viewport(), Viewport::default());

        store.add_node(process("a", 0.0, 0.0)).unwrap();
        store.add_node(process("b", 1450.0, 0.0)).unwrap();
        store.fit_to_screen();
        let viewport = store.viewport();
        assert!(viewport.zoom < 1.0);
        assert!((viewport.x - (400.0 - 800.0 * viewport.zoom)).abs() < 1e-9);

        // viewport changes are not undoable
        assert_eq!(store.history().past_len(), depth + 2);
    }

    #[test]
    fn test_events_published_after_commit() {
        let sink = Arc::new(VecEventSink::new());
        let mut store = store().with_event_sink(sink.clone());

        store.add_node(process("a", 0.0, 0.0)).unwrap();
        let events = sink.events();
        assert_eq!(
            events[0],
            DocumentEvent::NodeAdded {
                node_id: "a".to_string()
            }
        );
        assert!(matches!(
            events[1],
            DocumentEvent::HistoryChanged { can_undo: true, can_redo: false, version: 1 }
        ));

        sink.clear();
        let _ = store.add_edge(NewEdge::new("a", "a"));
        assert!(sink.events().is_empty());

        store.select_node("a", false).unwrap();
        sink.clear();
        store.zoom_in();
        store.undo().unwrap();
        assert_eq!(
            sink.kinds(),
            vec!["viewportChanged", "selectionChanged", "historyChanged"]
        );
    }

    #[tokio::test]
    async fn test_save_clears_dirty_flag() {
        let persistence = Arc::new(MemoryPersistence::new());
        let mut store = DocumentStore::new(persistence.clone());
        store.add_node(process("a", 0.0, 0.0)).unwrap();

        store.save().await.unwrap();
        assert!(!store.is_dirty());
        let stored = persistence.get(&store.document().id).unwrap();
        assert_eq!(stored.nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_state() {
        let mut store = DocumentStore::new(Arc::new(FailingPersistence));
        store.add_node(process("a", 0.0, 0.0)).unwrap();
        let before = store.document().clone();

        let err = store.save().await.unwrap_err();
        assert!(matches!(err, DiagramError::PersistenceFailure(_)));
        assert!(store.is_dirty());
        assert_eq!(store.document(), &before);
        assert!(store.can_undo());
    }

    #[test]
    fn test_load_by_id_round_trip() {
        let persistence = Arc::new(MemoryPersistence::new());
        let mut store = DocumentStore::new(persistence.clone());
        store.create_new(DiagramKind::MindMap, "ideas");
        store.add_node(process("a", 0.0, 0.0)).unwrap();
        let id = store.document().id.clone();
        tokio_test::block_on(store.save()).unwrap();

        let mut other = DocumentStore::new(persistence);
        tokio_test::block_on(other.load_by_id(&id)).unwrap();
        assert_eq!(other.document().kind, DiagramKind::MindMap);
        assert_eq!(other.nodes().len(), 1);
        assert!(!other.can_undo());
        assert!(tokio_test::block_on(other.load_by_id("missing"))
            .unwrap_err()
            .is_not_found());
    }
}
