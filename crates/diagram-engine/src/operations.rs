//! Composite node operations built on the document store
//!
//! Each operation runs as a single [`DocumentStore::batch`], so it either
//! applies completely as one undo step or leaves the document untouched.

use std::collections::HashSet;

use crate::constants::defaults;
use crate::error::{DiagramError, Result};
use crate::store::{DocumentStore, RemovedNode};
use crate::types::{
    ConnectionDirection, Edge, EdgeStyle, FlowchartData, GraphDocument, GroupData, MindMapData,
    NewEdge, NewNode, Node, NodeCategory, NodeId, NodePatch, NodePayload, OrganogramData,
    PersonRecord, Position, ProcessType, Size,
};

/// Options for [`NodeOperations::create_typed_node`]
#[derive(Debug, Clone, Default)]
pub struct TypedNodeOptions {
    /// Overrides the category's default label
    pub label: Option<String>,
    /// Connect the new node as a child of this node
    pub parent_id: Option<NodeId>,
    /// Overrides the category's default size
    pub size: Option<Size>,
}

impl TypedNodeOptions {
    pub fn child_of(parent_id: impl Into<NodeId>) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Result of grouping nodes
#[derive(Debug, Clone)]
pub struct GroupResult {
    /// The new grouping node
    pub group: Node,
    /// One dashed edge from the group to each member
    pub edges: Vec<Edge>,
}

/// Operations for creating, cloning, grouping and removing nodes
pub struct NodeOperations;

impl NodeOperations {
    /// Default payload for a category at a hierarchy level
    pub fn default_payload(category: NodeCategory, level: u32) -> NodePayload {
        match category {
            NodeCategory::Flowchart => NodePayload::Flowchart(FlowchartData {
                process_type: ProcessType::Process,
                ..Default::default()
            }),
            NodeCategory::Organogram => NodePayload::Organogram(OrganogramData {
                person: PersonRecord {
                    name: String::new(),
                    role: if level == 0 { "CEO" } else { "Employee" }.to_string(),
                    ..Default::default()
                },
                level,
                ..Default::default()
            }),
            NodeCategory::MindMap => NodePayload::MindMap(MindMapData {
                level,
                ..Default::default()
            }),
            NodeCategory::Group => NodePayload::Group(GroupData::default()),
        }
    }

    pub fn default_label(category: NodeCategory, level: u32) -> &'static str {
        match (category, level) {
            (NodeCategory::Flowchart, _) => "New Task",
            (NodeCategory::Organogram, 0) => "CEO",
            (NodeCategory::Organogram, _) => "Employee",
            (NodeCategory::MindMap, 0) => "Central Topic",
            (NodeCategory::MindMap, 1) => "Main Topic",
            (NodeCategory::MindMap, _) => "Subtopic",
            (NodeCategory::Group, _) => "Group",
        }
    }

    pub fn default_size(category: NodeCategory, level: u32) -> Size {
        match (category, level) {
            (NodeCategory::Flowchart, _) => Size::new(120.0, 80.0),
            (NodeCategory::Organogram, _) => Size::new(120.0, 80.0),
            (NodeCategory::MindMap, 0) => Size::new(120.0, 120.0),
            (NodeCategory::MindMap, 1) => Size::new(100.0, 60.0),
            (NodeCategory::MindMap, _) => Size::new(80.0, 40.0),
            (NodeCategory::Group, _) => Size::default(),
        }
    }

    /// Create a node with category defaults, optionally connected to a parent
    ///
    /// Children of organogram and mind map nodes sit one level below their parent.
    pub fn create_typed_node(
        store: &mut DocumentStore,
        category: NodeCategory,
        position: Position,
        options: TypedNodeOptions,
    ) -> Result<Node> {
        let level = match &options.parent_id {
            Some(parent_id) => {
                let parent = store
                    .find_node(parent_id)
                    .ok_or_else(|| DiagramError::node_not_found(parent_id))?;
                match (category, parent.data.level()) {
                    (NodeCategory::Organogram | NodeCategory::MindMap, Some(level)) => level + 1,
                    (NodeCategory::Organogram | NodeCategory::MindMap, None) => 1,
                    _ => 0,
                }
            }
            None => 0,
        };

        let label = options
            .label
            .unwrap_or_else(|| Self::default_label(category, level).to_string());
        let spec = NewNode::new(label, position, Self::default_payload(category, level))
            .with_size(options.size.unwrap_or(Self::default_size(category, level)));

        store.batch(|editor| {
            let node = editor.add_node(spec)?;
            if let Some(parent_id) = options.parent_id {
                editor.add_edge(NewEdge::new(parent_id, node.id.clone()))?;
            }
            Ok(node)
        })
    }

    /// Duplicate a node's payload at an offset; incident edges are not copied
    pub fn clone_node(
        store: &mut DocumentStore,
        id: &str,
        offset: Option<(f64, f64)>,
    ) -> Result<Node> {
        let original = store
            .find_node(id)
            .ok_or_else(|| DiagramError::node_not_found(id))?;
        let (dx, dy) = offset.unwrap_or((defaults::CLONE_OFFSET, defaults::CLONE_OFFSET));

        let mut spec = NewNode::new(
            format!("{}{}", original.label, defaults::CLONE_SUFFIX),
            original.position.offset(dx, dy),
            original.data.clone(),
        );
        spec.size = original.size;

        store.add_node(spec)
    }

    /// Remove every edge touching the node, then the node itself
    pub fn delete_node_with_connections(store: &mut DocumentStore, id: &str) -> Result<RemovedNode> {
        store.batch(|editor| {
            let node = editor
                .document()
                .find_node(id)
                .ok_or_else(|| DiagramError::node_not_found(id))?;
            if node.is_organogram_root() {
                return Err(DiagramError::Forbidden(format!(
                    "node '{}' is the root of the organization chart",
                    id
                )));
            }

            let edge_ids: Vec<String> = editor
                .document()
                .edges
                .iter()
                .filter(|e| e.touches(id))
                .map(|e| e.id.clone())
                .collect();

            let mut edges = Vec::with_capacity(edge_ids.len());
            for edge_id in edge_ids {
                edges.push(editor.delete_edge(&edge_id)?);
            }
            let removed = editor.delete_node(id)?;

            Ok(RemovedNode {
                node: removed.node,
                edges,
            })
        })
    }

    /// Move a node; `None` if the node does not exist
    pub fn move_node_to(
        store: &mut DocumentStore,
        id: &str,
        position: Position,
    ) -> Result<Option<Node>> {
        if store.find_node(id).is_none() {
            return Ok(None);
        }
        store.update_node(id, NodePatch::position(position)).map(Some)
    }

    /// Create a grouping node connected to each member by a dashed edge
    ///
    /// Without `center`, the group is placed at the centroid of the members'
    /// positions. Needs at least two distinct existing nodes.
    pub fn group_nodes(
        store: &mut DocumentStore,
        ids: &[NodeId],
        center: Option<Position>,
    ) -> Result<GroupResult> {
        let mut seen = HashSet::new();
        let members: Vec<&Node> = ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| store.find_node(id))
            .collect();

        if members.len() < 2 {
            return Err(DiagramError::invalid(format!(
                "grouping needs at least 2 existing nodes, got {}",
                members.len()
            )));
        }

        let position = center.unwrap_or_else(|| {
            let count = members.len() as f64;
            Position::new(
                members.iter().map(|n| n.position.x).sum::<f64>() / count,
                members.iter().map(|n| n.position.y).sum::<f64>() / count,
            )
        });
        let member_ids: Vec<NodeId> = members.iter().map(|n| n.id.clone()).collect();

        let spec = NewNode::new(
            Self::default_label(NodeCategory::Group, 0),
            position,
            NodePayload::Group(GroupData {
                member_ids: member_ids.clone(),
            }),
        );

        store.batch(|editor| {
            let group = editor.add_node(spec)?;
            let mut edges = Vec::with_capacity(member_ids.len());
            for member in member_ids {
                edges.push(editor.add_edge(
                    NewEdge::new(group.id.clone(), member).with_style(EdgeStyle::dashed()),
                )?);
            }
            Ok(GroupResult { group, edges })
        })
    }

    /// Neighbor nodes in the given direction, never including `id`
    pub fn get_connected_nodes(
        doc: &GraphDocument,
        id: &str,
        direction: ConnectionDirection,
    ) -> Vec<Node> {
        doc.connected_nodes(id, direction)
            .into_iter()
            .cloned()
            .collect()
    }

    /// False for unknown ids and for the organogram root position
    pub fn can_delete_node(doc: &GraphDocument, id: &str) -> bool {
        doc.find_node(id)
            .is_some_and(|node| !node.is_organogram_root())
    }
}
