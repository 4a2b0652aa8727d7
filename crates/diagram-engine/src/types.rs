//! Core types for diagram documents
//!
//! These types define the structure of an editable diagram: nodes with
//! category-specific payloads, directed edges with routing metadata, and
//! the document that owns them together with its viewport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::defaults;

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Unique identifier for a document
pub type DocumentId = String;

// ─── GEOMETRY ───────────────────────────────────────────────────────────────

/// A point on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn distance(self, other: Position) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

/// Width and height of a node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for Size {
    fn default() -> Self {
        Self::new(defaults::NODE_WIDTH, defaults::NODE_HEIGHT)
    }
}

/// Axis-aligned rectangle used for hit testing and routing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    pub fn new(position: Position, size: Size) -> Self {
        Self {
            min_x: position.x,
            min_y: position.y,
            max_x: position.x + size.width,
            max_y: position.y + size.height,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Position {
        Position::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Grow the rectangle by `padding` on every side
    pub fn inflate(&self, padding: f64) -> Self {
        Self {
            min_x: self.min_x - padding,
            min_y: self.min_y - padding,
            max_x: self.max_x + padding,
            max_y: self.max_y + padding,
        }
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &Rect) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Boundary-inclusive containment
    pub fn contains(&self, point: Position) -> bool {
        point.x >= self.min_x
            && point.x <= self.max_x
            && point.y >= self.min_y
            && point.y <= self.max_y
    }

    /// Strict containment, points on the boundary are outside
    pub fn contains_strict(&self, point: Position) -> bool {
        point.x > self.min_x && point.x < self.max_x && point.y > self.min_y && point.y < self.max_y
    }

    /// Whether the segment `a`-`b` touches this rectangle (boundary inclusive)
    ///
    /// Liang-Barsky clipping against the four slabs.
    pub fn intersects_segment(&self, a: Position, b: Position) -> bool {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let mut t0 = 0.0_f64;
        let mut t1 = 1.0_f64;

        for (p, q) in [
            (-dx, a.x - self.min_x),
            (dx, self.max_x - a.x),
            (-dy, a.y - self.min_y),
            (dy, self.max_y - a.y),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return false;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return false;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return false;
                }
                t1 = t1.min(r);
            }
        }
        t0 <= t1
    }
}

/// Canvas pan and zoom
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

// ─── NODE PAYLOADS ──────────────────────────────────────────────────────────

/// Kind of diagram a document holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramKind {
    #[default]
    Flowchart,
    Organogram,
    MindMap,
    Custom,
}

/// Node category, the discriminant of [`NodePayload`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeCategory {
    Flowchart,
    Organogram,
    MindMap,
    Group,
}

impl NodeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flowchart => "flowchart",
            Self::Organogram => "organogram",
            Self::MindMap => "mindmap",
            Self::Group => "group",
        }
    }
}

impl std::fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowchartShape {
    #[default]
    Rectangle,
    RoundedRectangle,
    Diamond,
    Circle,
    Ellipse,
    Parallelogram,
    Hexagon,
}

/// Semantic role of a flowchart step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessType {
    Start,
    #[default]
    Process,
    Decision,
    End,
    Data,
    Document,
    Subprocess,
    Connector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowchartData {
    pub shape: FlowchartShape,
    pub process_type: ProcessType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
}

/// The person shown on an organogram node
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRecord {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub department: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganogramData {
    pub person: PersonRecord,
    /// Hierarchy level, 0 is the root position
    pub level: u32,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindMapData {
    pub level: u32,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub related_node_ids: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupData {
    pub member_ids: Vec<NodeId>,
}

/// Category-specific node data, tagged by `category`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum NodePayload {
    Flowchart(FlowchartData),
    Organogram(OrganogramData),
    MindMap(MindMapData),
    Group(GroupData),
}

impl NodePayload {
    pub fn category(&self) -> NodeCategory {
        match self {
            Self::Flowchart(_) => NodeCategory::Flowchart,
            Self::Organogram(_) => NodeCategory::Organogram,
            Self::MindMap(_) => NodeCategory::MindMap,
            Self::Group(_) => NodeCategory::Group,
        }
    }

    /// Hierarchy level for categories that carry one
    pub fn level(&self) -> Option<u32> {
        match self {
            Self::Organogram(data) => Some(data.level),
            Self::MindMap(data) => Some(data.level),
            Self::Flowchart(_) | Self::Group(_) => None,
        }
    }
}

// ─── NODES ──────────────────────────────────────────────────────────────────

/// A vertex of the diagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    pub data: NodePayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Node {
    /// Create a node with a fresh id
    pub fn new(label: impl Into<String>, position: Position, data: NodePayload) -> Self {
        let now = Utc::now();
        Self {
            id: format!("node-{}", uuid::Uuid::new_v4()),
            label: label.into(),
            position,
            size: None,
            data,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    pub fn category(&self) -> NodeCategory {
        self.data.category()
    }

    /// Size used for geometry, falling back to the default node size
    pub fn effective_size(&self) -> Size {
        self.size.unwrap_or_default()
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.position, self.effective_size())
    }

    pub fn center(&self) -> Position {
        self.bounds().center()
    }

    /// Whether this node occupies the root position of an organization chart
    pub fn is_organogram_root(&self) -> bool {
        matches!(&self.data, NodePayload::Organogram(data) if data.level == 0)
    }
}

/// Input for creating a node
#[derive(Debug, Clone, PartialEq)]
pub struct NewNode {
    /// Use this id instead of minting one; must not collide
    pub id: Option<NodeId>,
    pub label: String,
    pub position: Position,
    pub size: Option<Size>,
    pub data: NodePayload,
}

impl NewNode {
    pub fn new(label: impl Into<String>, position: Position, data: NodePayload) -> Self {
        Self {
            id: None,
            label: label.into(),
            position,
            size: None,
            data,
        }
    }

    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }
}

/// Partial update for a node; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub label: Option<String>,
    pub position: Option<Position>,
    /// `Some(None)` clears the explicit size
    pub size: Option<Option<Size>>,
    pub data: Option<NodePayload>,
}

impl NodePatch {
    pub fn position(position: Position) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Default::default()
        }
    }

    /// Whether applying this patch changes geometry
    pub fn moves(&self) -> bool {
        self.position.is_some() || self.size.is_some()
    }
}

// ─── EDGES ──────────────────────────────────────────────────────────────────

/// How the renderer should draw an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    Straight,
    #[default]
    OrthogonalSmoothed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    pub stroke_width: f64,
    /// SVG dash array, `None` for a solid line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dash: Option<String>,
}

impl Default for EdgeStyle {
    fn default() -> Self {
        Self {
            stroke: None,
            stroke_width: 2.0,
            dash: None,
        }
    }
}

impl EdgeStyle {
    pub fn dashed() -> Self {
        Self {
            dash: Some(defaults::GROUP_EDGE_DASH.to_string()),
            ..Default::default()
        }
    }
}

/// Metadata describing the last computed route of an edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingInfo {
    pub total_length: f64,
    pub has_obstacles: bool,
    pub segment_count: usize,
    pub routed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub style: EdgeStyle,
    #[serde(default)]
    pub animated: bool,
    /// Cached SVG path string from the router
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutingInfo>,
}

/// A directed connector between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default)]
    pub kind: EdgeKind,
    #[serde(default)]
    pub data: EdgeData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Edge {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("edge-{}", uuid::Uuid::new_v4()),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            kind: EdgeKind::default(),
            data: EdgeData::default(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Input for creating an edge
#[derive(Debug, Clone, PartialEq)]
pub struct NewEdge {
    pub id: Option<EdgeId>,
    pub source: NodeId,
    pub target: NodeId,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
    pub kind: EdgeKind,
    pub data: EdgeData,
}

impl NewEdge {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            kind: EdgeKind::default(),
            data: EdgeData::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<EdgeId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_kind(mut self, kind: EdgeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_style(mut self, style: EdgeStyle) -> Self {
        self.data.style = style;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.data.label = Some(label.into());
        self
    }
}

/// Partial update for an edge; endpoints are immutable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgePatch {
    /// `Some(None)` clears the label
    pub label: Option<Option<String>>,
    pub kind: Option<EdgeKind>,
    pub style: Option<EdgeStyle>,
    pub animated: Option<bool>,
    pub source_handle: Option<Option<String>>,
    pub target_handle: Option<Option<String>>,
}

/// Which incident edges a neighborhood query follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionDirection {
    Incoming,
    Outgoing,
    #[default]
    Both,
}

// ─── DOCUMENT ───────────────────────────────────────────────────────────────

/// Canvas settings persisted with a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasConfig {
    pub snap_to_grid: bool,
    pub grid_size: f64,
    pub show_grid: bool,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            snap_to_grid: false,
            grid_size: defaults::GRID_SIZE,
            show_grid: true,
        }
    }
}

/// One diagram being edited
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDocument {
    pub id: DocumentId,
    pub kind: DiagramKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default)]
    pub config: CanvasConfig,
    pub version: u64,
    /// Set by every mutation, cleared by a successful save
    #[serde(default)]
    pub unsaved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GraphDocument {
    /// Create an empty document
    pub fn new(kind: DiagramKind, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("diagram-{}", uuid::Uuid::new_v4()),
            kind,
            title: title.into(),
            description: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            viewport: Viewport::default(),
            config: CanvasConfig::default(),
            version: 0,
            unsaved: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn find_node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn find_edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn find_edge_mut(&mut self, id: &str) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|e| e.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.find_node(id).is_some()
    }

    pub fn incoming_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    pub fn outgoing_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    pub fn has_edge_between(&self, source: &str, target: &str) -> bool {
        self.edges
            .iter()
            .any(|e| e.source == source && e.target == target)
    }

    /// Neighbor nodes of `node_id`, deduplicated and never including the node itself
    pub fn connected_nodes(&self, node_id: &str, direction: ConnectionDirection) -> Vec<&Node> {
        let mut ids: Vec<&str> = Vec::new();
        for edge in &self.edges {
            let neighbor = match direction {
                ConnectionDirection::Outgoing if edge.source == node_id => &edge.target,
                ConnectionDirection::Incoming if edge.target == node_id => &edge.source,
                ConnectionDirection::Both if edge.source == node_id => &edge.target,
                ConnectionDirection::Both if edge.target == node_id => &edge.source,
                _ => continue,
            };
            if neighbor != node_id && !ids.contains(&neighbor.as_str()) {
                ids.push(neighbor);
            }
        }
        ids.into_iter().filter_map(|id| self.find_node(id)).collect()
    }

    /// Bounding box of every node, `None` for an empty document
    pub fn bounds(&self) -> Option<Rect> {
        self.nodes
            .iter()
            .map(Node::bounds)
            .reduce(|acc, rect| acc.union(&rect))
    }

    /// Edges whose endpoints are missing from the node set
    pub fn dangling_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges
            .iter()
            .filter(|e| !self.contains_node(&e.source) || !self.contains_node(&e.target))
    }

    /// Compare content, ignoring document bookkeeping (version, unsaved flag, timestamps)
    pub fn same_content(&self, other: &GraphDocument) -> bool {
        self.id == other.id
            && self.kind == other.kind
            && self.title == other.title
            && self.description == other.description
            && self.nodes == other.nodes
            && self.edges == other.edges
            && self.viewport == other.viewport
            && self.config == other.config
    }
}
