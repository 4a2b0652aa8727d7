//! System default templates
//!
//! Seeded on startup when missing. Ids are fixed so seeding is idempotent.

use chrono::Utc;
use diagram_engine::{
    Edge, FlowchartData, FlowchartShape, MindMapData, Node, NodeCategory, NodeOperations,
    NodePayload, OrganogramData, PersonRecord, Position, ProcessType,
};

use crate::constants::catalog::SYSTEM_AUTHOR;
use crate::thumbnail;
use crate::types::{Difficulty, NewTemplate, Template, TemplateCategory, TemplateMetadata};

pub const ORG_BASIC: &str = "org-basic";
pub const PROCESS_APPROVAL: &str = "process-approval";
pub const MINDMAP_PROJECT: &str = "mindmap-project";

/// All system defaults, freshly built
pub fn default_templates() -> Vec<Template> {
    vec![org_basic(), process_approval(), mindmap_project()]
}

fn seed(id: &str, spec: NewTemplate) -> Template {
    let now = Utc::now();
    Template {
        id: id.to_string(),
        name: spec.name,
        description: spec.description,
        category: spec.category,
        thumbnail: thumbnail::synthesize(&spec.nodes, &spec.edges),
        nodes: spec.nodes,
        edges: spec.edges,
        metadata: TemplateMetadata {
            author: SYSTEM_AUTHOR.to_string(),
            tags: spec.tags,
            difficulty: spec.difficulty,
            estimated_minutes: spec.estimated_minutes,
            created_at: now,
            updated_at: now,
        },
        is_public: true,
        is_default: true,
    }
}

fn edge(id: &str, source: &str, target: &str) -> Edge {
    let mut edge = Edge::new(source, target);
    edge.id = id.to_string();
    edge
}

fn person(id: &str, title: &str, level: u32, x: f64, y: f64) -> Node {
    let data = NodePayload::Organogram(OrganogramData {
        person: PersonRecord {
            name: title.to_string(),
            role: title.to_string(),
            ..Default::default()
        },
        level,
        ..Default::default()
    });
    Node::new(title, Position::new(x, y), data)
        .with_id(id)
        .with_size(NodeOperations::default_size(NodeCategory::Organogram, level))
}

fn org_basic() -> Template {
    let nodes = vec![
        person("ceo", "CEO", 0, 340.0, 0.0),
        person("manager-a", "Manager A", 1, 160.0, 160.0),
        person("manager-b", "Manager B", 1, 520.0, 160.0),
        person("employee-1", "Employee 1", 2, 60.0, 320.0),
        person("employee-2", "Employee 2", 2, 260.0, 320.0),
        person("employee-3", "Employee 3", 2, 420.0, 320.0),
        person("employee-4", "Employee 4", 2, 620.0, 320.0),
    ];
    let edges = vec![
        edge("e1", "ceo", "manager-a"),
        edge("e2", "ceo", "manager-b"),
        edge("e3", "manager-a", "employee-1"),
        edge("e4", "manager-a", "employee-2"),
        edge("e5", "manager-b", "employee-3"),
        edge("e6", "manager-b", "employee-4"),
    ];
    seed(
        ORG_BASIC,
        NewTemplate {
            difficulty: Difficulty::Beginner,
            estimated_minutes: 15,
            ..NewTemplate::new("Basic Organization Chart", TemplateCategory::Organizational)
                .with_description(
                    "Simple hierarchy with one executive, two managers and their reports",
                )
                .with_tags(["hierarchy", "organization", "basic"])
                .with_graph(nodes, edges)
        },
    )
}

fn step(id: &str, label: &str, process_type: ProcessType, x: f64, y: f64) -> Node {
    let shape = match process_type {
        ProcessType::Start | ProcessType::End => FlowchartShape::RoundedRectangle,
        ProcessType::Decision => FlowchartShape::Diamond,
        _ => FlowchartShape::Rectangle,
    };
    let data = NodePayload::Flowchart(FlowchartData {
        shape,
        process_type,
        ..Default::default()
    });
    Node::new(label, Position::new(x, y), data)
        .with_id(id)
        .with_size(NodeOperations::default_size(NodeCategory::Flowchart, 0))
}

fn process_approval() -> Template {
    let nodes = vec![
        step("request", "Request", ProcessType::Start, 250.0, 0.0),
        step("review", "Initial Review", ProcessType::Process, 250.0, 140.0),
        step("decision", "Approved?", ProcessType::Decision, 250.0, 280.0),
        step("approved", "Approved", ProcessType::End, 100.0, 420.0),
        step("rejected", "Rejected", ProcessType::End, 400.0, 420.0),
    ];
    let mut yes = edge("e3", "decision", "approved");
    yes.data.label = Some("Yes".to_string());
    let mut no = edge("e4", "decision", "rejected");
    no.data.label = Some("No".to_string());
    let edges = vec![
        edge("e1", "request", "review"),
        edge("e2", "review", "decision"),
        yes,
        no,
    ];
    seed(
        PROCESS_APPROVAL,
        NewTemplate {
            difficulty: Difficulty::Intermediate,
            estimated_minutes: 20,
            ..NewTemplate::new("Approval Process", TemplateCategory::Process)
                .with_description("Request intake, review and an approve/reject decision")
                .with_tags(["approval", "business", "decision", "workflow"])
                .with_graph(nodes, edges)
        },
    )
}

fn topic(id: &str, label: &str, level: u32, x: f64, y: f64) -> Node {
    let data = NodePayload::MindMap(MindMapData {
        level,
        ..Default::default()
    });
    Node::new(label, Position::new(x, y), data)
        .with_id(id)
        .with_size(NodeOperations::default_size(NodeCategory::MindMap, level))
}

fn mindmap_project() -> Template {
    let nodes = vec![
        topic("project", "Project", 0, 340.0, 190.0),
        topic("objectives", "Objectives", 1, 140.0, 80.0),
        topic("resources", "Resources", 1, 560.0, 80.0),
        topic("timeline", "Timeline", 1, 140.0, 360.0),
        topic("risks", "Risks", 1, 560.0, 360.0),
    ];
    let edges = vec![
        edge("e1", "project", "objectives"),
        edge("e2", "project", "resources"),
        edge("e3", "project", "timeline"),
        edge("e4", "project", "risks"),
    ];
    seed(
        MINDMAP_PROJECT,
        NewTemplate {
            difficulty: Difficulty::Intermediate,
            estimated_minutes: 25,
            ..NewTemplate::new("Project Planning", TemplateCategory::Mindmap)
                .with_description(
                    "Central project topic branching into objectives, resources, timeline and risks",
                )
                .with_tags(["project", "planning", "management"])
                .with_graph(nodes, edges)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_well_formed() {
        let templates = default_templates();
        let ids: Vec<&str> = templates.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec![ORG_BASIC, PROCESS_APPROVAL, MINDMAP_PROJECT]);

        for template in &templates {
            assert!(template.is_default && template.is_public);
            assert_eq!(template.metadata.author, "System");
            assert_eq!(template.dangling_edges().count(), 0, "{}", template.id);
            assert!(template.thumbnail.contains("<rect"));
        }
    }

    #[test]
    fn test_org_chart_has_single_root() {
        let org = org_basic();
        let roots = org.nodes.iter().filter(|n| n.is_organogram_root()).count();
        assert_eq!(roots, 1);
    }
}
