//! Template data model
//!
//! A template is a detached node/edge subgraph plus catalog metadata. It is
//! never linked to a live document; applying it deep-copies the graph.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use diagram_engine::{Edge, Node, NodeId, NodePayload, Position};
use serde::{Deserialize, Serialize};

use crate::constants::export;

pub type TemplateId = String;

/// Catalog grouping for templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateCategory {
    Organizational,
    Process,
    Mindmap,
    Decision,
    Planning,
    #[default]
    Custom,
}

impl TemplateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organizational => "organizational",
            Self::Process => "process",
            Self::Mindmap => "mindmap",
            Self::Decision => "decision",
            Self::Planning => "planning",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for TemplateCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMetadata {
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Rough time to adapt the template, in minutes
    #[serde(default)]
    pub estimated_minutes: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A reusable, detached subgraph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: TemplateCategory,
    /// Compact SVG preview synthesized from the graph
    #[serde(default)]
    pub thumbnail: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub metadata: TemplateMetadata,
    #[serde(default)]
    pub is_public: bool,
    /// System defaults are seeded at startup and cannot be deleted
    #[serde(default)]
    pub is_default: bool,
}

impl Template {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.metadata.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Edges referencing a node missing from the template
    pub fn dangling_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|e| {
            !self.nodes.iter().any(|n| n.id == e.source)
                || !self.nodes.iter().any(|n| n.id == e.target)
        })
    }

    /// Deep copy of the graph with fresh ids, shifted by `offset`
    ///
    /// Edge endpoints are remapped to the new node ids. Cached routes are
    /// dropped since they no longer match the shifted geometry.
    pub fn instantiate_graph(&self, offset: Position) -> (Vec<Node>, Vec<Edge>) {
        let now = Utc::now();
        let mut ids: HashMap<&str, NodeId> = HashMap::new();

        let mut nodes: Vec<Node> = self
            .nodes
            .iter()
            .map(|node| {
                let fresh = format!("node-{}", uuid::Uuid::new_v4());
                ids.insert(node.id.as_str(), fresh.clone());
                Node {
                    id: fresh,
                    position: node.position.offset(offset.x, offset.y),
                    created_at: now,
                    updated_at: now,
                    version: 1,
                    ..node.clone()
                }
            })
            .collect();

        // payload references follow the remapped ids; unknown ones are dropped
        let remap = |refs: &mut Vec<NodeId>| {
            *refs = refs
                .iter()
                .filter_map(|id| ids.get(id.as_str()).cloned())
                .collect();
        };
        for node in &mut nodes {
            match &mut node.data {
                NodePayload::MindMap(data) => remap(&mut data.related_node_ids),
                NodePayload::Group(data) => remap(&mut data.member_ids),
                NodePayload::Flowchart(_) | NodePayload::Organogram(_) => {}
            }
        }

        let edges = self
            .edges
            .iter()
            .filter_map(|edge| {
                let source = ids.get(edge.source.as_str())?.clone();
                let target = ids.get(edge.target.as_str())?.clone();
                let mut copy = Edge {
                    id: format!("edge-{}", uuid::Uuid::new_v4()),
                    source,
                    target,
                    created_at: now,
                    updated_at: now,
                    version: 1,
                    ..edge.clone()
                };
                copy.data.path = None;
                copy.data.routing = None;
                Some(copy)
            })
            .collect();

        (nodes, edges)
    }
}

/// Input for creating a template
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTemplate {
    pub name: String,
    pub description: String,
    pub category: TemplateCategory,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub author: String,
    pub tags: Vec<String>,
    pub difficulty: Difficulty,
    pub estimated_minutes: u32,
    pub is_public: bool,
}

impl NewTemplate {
    pub fn new(name: impl Into<String>, category: TemplateCategory) -> Self {
        Self {
            name: name.into(),
            category,
            ..Default::default()
        }
    }

    pub fn with_graph(mut self, nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        self.nodes = nodes;
        self.edges = edges;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn public(mut self) -> Self {
        self.is_public = true;
        self
    }
}

/// Partial update for a template; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplatePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<TemplateCategory>,
    pub nodes: Option<Vec<Node>>,
    pub edges: Option<Vec<Edge>>,
    pub tags: Option<Vec<String>>,
    pub difficulty: Option<Difficulty>,
    pub estimated_minutes: Option<u32>,
    pub is_public: Option<bool>,
}

impl TemplatePatch {
    /// Whether the patch replaces any part of the graph
    pub fn changes_graph(&self) -> bool {
        self.nodes.is_some() || self.edges.is_some()
    }
}

/// Search criteria; empty fields match everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateFilters {
    #[serde(default)]
    pub category: Option<TemplateCategory>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub is_public: Option<bool>,
    /// Matches templates carrying at least one of these tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Case-insensitive substring of name, description or a tag
    #[serde(default)]
    pub search: Option<String>,
}

impl TemplateFilters {
    pub fn matches(&self, template: &Template) -> bool {
        if self.category.is_some_and(|c| c != template.category) {
            return false;
        }
        if self
            .difficulty
            .is_some_and(|d| d != template.metadata.difficulty)
        {
            return false;
        }
        if self.is_public.is_some_and(|p| p != template.is_public) {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| template.has_tag(t)) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                template.name.to_lowercase().contains(&term)
                    || template.description.to_lowercase().contains(&term)
                    || template
                        .metadata
                        .tags
                        .iter()
                        .any(|t| t.to_lowercase().contains(&term))
            }
            _ => true,
        }
    }
}

/// One page of search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePage {
    pub templates: Vec<Template>,
    /// Matches across all pages
    pub total: usize,
    /// 1-based page number
    pub page: usize,
    pub page_size: usize,
    pub has_more: bool,
}

/// Per-template usage counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateUsageStat {
    pub template_id: TemplateId,
    pub usage_count: u64,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub rating_count: u32,
}

impl TemplateUsageStat {
    pub fn new(template_id: impl Into<TemplateId>) -> Self {
        Self {
            template_id: template_id.into(),
            usage_count: 0,
            last_used: None,
            average_rating: 0.0,
            rating_count: 0,
        }
    }

    pub fn record_use(&mut self, at: DateTime<Utc>) {
        self.usage_count += 1;
        self.last_used = Some(at);
    }

    /// Fold a rating into the running mean
    pub fn add_rating(&mut self, rating: u8) {
        let total = self.average_rating * f64::from(self.rating_count) + f64::from(rating);
        self.rating_count += 1;
        self.average_rating = total / f64::from(self.rating_count);
    }
}

/// Portable form of a single template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedTemplate {
    pub format: String,
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
    #[serde(flatten)]
    pub template: Template,
}

impl ExportedTemplate {
    pub fn new(template: Template) -> Self {
        Self {
            format: export::FORMAT.to_string(),
            format_version: export::FORMAT_VERSION,
            exported_at: Utc::now(),
            template,
        }
    }
}
