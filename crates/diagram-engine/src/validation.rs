//! Connection and document validation
//!
//! Connection checks run before an edge is committed and reject
//! self-loops, duplicate ordered pairs and category-specific violations.
//! Document validation reports every structural issue found at once.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::DiagramError;
use crate::types::{DiagramKind, GraphDocument, NewEdge, NodeCategory, NodePayload, ProcessType};

/// Whether edges between nodes of a category may close a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    Allow,
    Forbid,
}

/// Category-specific connection rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPolicy {
    #[serde(default = "allow")]
    pub flowchart_cycles: CyclePolicy,
    #[serde(default = "forbid")]
    pub organogram_cycles: CyclePolicy,
    #[serde(default = "forbid")]
    pub mind_map_cycles: CyclePolicy,
    /// An organogram node reports to at most one other organogram node
    #[serde(default = "enabled")]
    pub organogram_single_manager: bool,
}

fn allow() -> CyclePolicy {
    CyclePolicy::Allow
}

fn forbid() -> CyclePolicy {
    CyclePolicy::Forbid
}

fn enabled() -> bool {
    true
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            flowchart_cycles: allow(),
            organogram_cycles: forbid(),
            mind_map_cycles: forbid(),
            organogram_single_manager: enabled(),
        }
    }
}

impl ConnectionPolicy {
    /// Policy that accepts any acyclic or cyclic connection
    pub fn permissive() -> Self {
        Self {
            flowchart_cycles: CyclePolicy::Allow,
            organogram_cycles: CyclePolicy::Allow,
            mind_map_cycles: CyclePolicy::Allow,
            organogram_single_manager: false,
        }
    }

    pub fn cycle_policy(&self, category: NodeCategory) -> CyclePolicy {
        match category {
            NodeCategory::Flowchart => self.flowchart_cycles,
            NodeCategory::Organogram => self.organogram_cycles,
            NodeCategory::MindMap => self.mind_map_cycles,
            NodeCategory::Group => CyclePolicy::Allow,
        }
    }

    /// Effective policy for an edge; forbidding wins
    pub fn cycle_policy_between(&self, source: NodeCategory, target: NodeCategory) -> CyclePolicy {
        if self.cycle_policy(source) == CyclePolicy::Forbid
            || self.cycle_policy(target) == CyclePolicy::Forbid
        {
            CyclePolicy::Forbid
        } else {
            CyclePolicy::Allow
        }
    }
}

/// Why a candidate connection was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionRejection {
    UnknownNode { node_id: String },
    SelfLoop { node_id: String },
    Duplicate { source: String, target: String },
    WouldCreateCycle { source: String, target: String },
    /// Target already has an organogram manager
    ManagerAlreadyAssigned { target: String, manager: String },
    /// The organogram root cannot report to anyone
    RootCannotReport { target: String },
}

impl std::fmt::Display for ConnectionRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownNode { node_id } => write!(f, "node '{}' does not exist", node_id),
            Self::SelfLoop { node_id } => write!(f, "node '{}' cannot connect to itself", node_id),
            Self::Duplicate { source, target } => {
                write!(f, "connection '{}' -> '{}' already exists", source, target)
            }
            Self::WouldCreateCycle { source, target } => {
                write!(f, "connection '{}' -> '{}' would create a cycle", source, target)
            }
            Self::ManagerAlreadyAssigned { target, manager } => {
                write!(f, "node '{}' already reports to '{}'", target, manager)
            }
            Self::RootCannotReport { target } => {
                write!(f, "root node '{}' cannot have a manager", target)
            }
        }
    }
}

impl std::error::Error for ConnectionRejection {}

impl From<ConnectionRejection> for DiagramError {
    fn from(rejection: ConnectionRejection) -> Self {
        match rejection {
            ConnectionRejection::UnknownNode { node_id } => DiagramError::node_not_found(&node_id),
            other => DiagramError::InvalidArgument(other.to_string()),
        }
    }
}

/// Check whether `source -> target` may be added to the document
pub fn validate_connection(
    doc: &GraphDocument,
    source: &str,
    target: &str,
    policy: &ConnectionPolicy,
) -> Result<(), ConnectionRejection> {
    let source_node = doc
        .find_node(source)
        .ok_or_else(|| ConnectionRejection::UnknownNode {
            node_id: source.to_string(),
        })?;
    let target_node = doc
        .find_node(target)
        .ok_or_else(|| ConnectionRejection::UnknownNode {
            node_id: target.to_string(),
        })?;

    if source == target {
        return Err(ConnectionRejection::SelfLoop {
            node_id: source.to_string(),
        });
    }

    if doc.has_edge_between(source, target) {
        return Err(ConnectionRejection::Duplicate {
            source: source.to_string(),
            target: target.to_string(),
        });
    }

    if let (NodePayload::Organogram(_), NodePayload::Organogram(target_data)) =
        (&source_node.data, &target_node.data)
    {
        if target_data.level == 0 {
            return Err(ConnectionRejection::RootCannotReport {
                target: target.to_string(),
            });
        }
        if policy.organogram_single_manager {
            let manager = doc.incoming_edges(target).find(|e| {
                doc.find_node(&e.source)
                    .is_some_and(|n| n.category() == NodeCategory::Organogram)
            });
            if let Some(edge) = manager {
                return Err(ConnectionRejection::ManagerAlreadyAssigned {
                    target: target.to_string(),
                    manager: edge.source.clone(),
                });
            }
        }
    }

    let cycle_policy = policy.cycle_policy_between(source_node.category(), target_node.category());
    if cycle_policy == CyclePolicy::Forbid && reaches(doc, target, source) {
        return Err(ConnectionRejection::WouldCreateCycle {
            source: source.to_string(),
            target: target.to_string(),
        });
    }

    Ok(())
}

/// Predicate form of [`validate_connection`] for a candidate edge
pub fn can_connect(doc: &GraphDocument, candidate: &NewEdge, policy: &ConnectionPolicy) -> bool {
    validate_connection(doc, &candidate.source, &candidate.target, policy).is_ok()
}

/// Breadth-first reachability along edge direction
fn reaches(doc: &GraphDocument, from: &str, to: &str) -> bool {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::from([from]);

    while let Some(current) = queue.pop_front() {
        if current == to {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        for edge in doc.outgoing_edges(current) {
            if !visited.contains(edge.target.as_str()) {
                queue.push_back(&edge.target);
            }
        }
    }
    false
}

// ─── DOCUMENT VALIDATION ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A structural problem found in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// An edge references a node that is not in the document
    UnknownNode { edge_id: String, node_id: String },
    DuplicateNodeId { node_id: String },
    /// A cycle runs through edges whose categories forbid cycles
    CycleDetected,
    /// A node has no connections
    IsolatedNode { node_id: String },
    MultipleRoots { count: usize },
    MissingStartStep,
    MissingEndStep,
}

impl ValidationIssue {
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnknownNode { .. } | Self::DuplicateNodeId { .. } | Self::CycleDetected => {
                Severity::Error
            }
            Self::IsolatedNode { .. }
            | Self::MultipleRoots { .. }
            | Self::MissingStartStep
            | Self::MissingEndStep => Severity::Warning,
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownNode { edge_id, node_id } => {
                write!(f, "Edge '{}' references unknown node '{}'", edge_id, node_id)
            }
            Self::DuplicateNodeId { node_id } => write!(f, "Node id '{}' is used twice", node_id),
            Self::CycleDetected => write!(f, "Cycle detected in hierarchy"),
            Self::IsolatedNode { node_id } => write!(f, "Node '{}' has no connections", node_id),
            Self::MultipleRoots { count } => {
                write!(f, "Organization chart has {} root positions", count)
            }
            Self::MissingStartStep => write!(f, "Flowchart has no start step"),
            Self::MissingEndStep => write!(f, "Flowchart has no end step"),
        }
    }
}

/// Validate a whole document
///
/// Returns all issues found (not just the first).
pub fn validate_document(doc: &GraphDocument, policy: &ConnectionPolicy) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    validate_node_ids(doc, &mut issues);
    validate_edge_references(doc, &mut issues);
    detect_forbidden_cycles(doc, policy, &mut issues);
    detect_isolated_nodes(doc, &mut issues);

    match doc.kind {
        DiagramKind::Organogram => validate_single_root(doc, &mut issues),
        DiagramKind::Flowchart => validate_start_end_presence(doc, &mut issues),
        DiagramKind::MindMap | DiagramKind::Custom => {}
    }

    issues
}

fn validate_node_ids(doc: &GraphDocument, issues: &mut Vec<ValidationIssue>) {
    let mut seen: HashSet<&str> = HashSet::new();
    for node in &doc.nodes {
        if !seen.insert(&node.id) {
            issues.push(ValidationIssue::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
    }
}

/// Check that all edge source/target nodes exist
fn validate_edge_references(doc: &GraphDocument, issues: &mut Vec<ValidationIssue>) {
    let node_ids: HashSet<&str> = doc.nodes.iter().map(|n| n.id.as_str()).collect();

    for edge in &doc.edges {
        for endpoint in [&edge.source, &edge.target] {
            if !node_ids.contains(endpoint.as_str()) {
                issues.push(ValidationIssue::UnknownNode {
                    edge_id: edge.id.clone(),
                    node_id: endpoint.clone(),
                });
            }
        }
    }
}

/// Kahn's algorithm over the edges whose endpoints forbid cycles
fn detect_forbidden_cycles(
    doc: &GraphDocument,
    policy: &ConnectionPolicy,
    issues: &mut Vec<ValidationIssue>,
) {
    let categories: HashMap<&str, NodeCategory> =
        doc.nodes.iter().map(|n| (n.id.as_str(), n.category())).collect();

    let edges: Vec<(&str, &str)> = doc
        .edges
        .iter()
        .filter_map(|e| {
            let source = categories.get(e.source.as_str())?;
            let target = categories.get(e.target.as_str())?;
            (policy.cycle_policy_between(*source, *target) == CyclePolicy::Forbid)
                .then_some((e.source.as_str(), e.target.as_str()))
        })
        .collect();

    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for (source, target) in &edges {
        in_degree.entry(*source).or_insert(0);
        *in_degree.entry(*target).or_insert(0) += 1;
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut visited = 0;
    while let Some(node_id) = queue.pop_front() {
        visited += 1;
        for (source, target) in &edges {
            if *source == node_id {
                if let Some(deg) = in_degree.get_mut(target) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(*target);
                    }
                }
            }
        }
    }

    if visited < in_degree.len() {
        issues.push(ValidationIssue::CycleDetected);
    }
}

fn detect_isolated_nodes(doc: &GraphDocument, issues: &mut Vec<ValidationIssue>) {
    if doc.nodes.len() < 2 {
        return;
    }
    for node in &doc.nodes {
        if !doc.edges.iter().any(|e| e.touches(&node.id)) {
            issues.push(ValidationIssue::IsolatedNode {
                node_id: node.id.clone(),
            });
        }
    }
}

fn validate_single_root(doc: &GraphDocument, issues: &mut Vec<ValidationIssue>) {
    let count = doc.nodes.iter().filter(|n| n.is_organogram_root()).count();
    if count > 1 {
        issues.push(ValidationIssue::MultipleRoots { count });
    }
}

fn validate_start_end_presence(doc: &GraphDocument, issues: &mut Vec<ValidationIssue>) {
    let has = |kind: ProcessType| {
        doc.nodes
            .iter()
            .any(|n| matches!(&n.data, NodePayload::Flowchart(data) if data.process_type == kind))
    };

    if doc.nodes.is_empty() {
        return;
    }
    if !has(ProcessType::Start) {
        issues.push(ValidationIssue::MissingStartStep);
    }
    if !has(ProcessType::End) {
        issues.push(ValidationIssue::MissingEndStep);
    }
}
