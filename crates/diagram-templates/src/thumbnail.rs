//! SVG preview synthesis
//!
//! Nodes are drawn as rectangles and edges as straight lines between node
//! centers, scaled to fit a fixed frame and centered in it.

use std::collections::HashMap;
use std::fmt::Write;

use diagram_engine::routing::coord;
use diagram_engine::{Edge, Node, Position, Rect};

use crate::constants::thumbnail::{EDGE_STROKE, FILL_RATIO, HEIGHT, NODE_FILL, NODE_STROKE, WIDTH};

/// Render a preview of the graph
pub fn synthesize(nodes: &[Node], edges: &[Edge]) -> String {
    let Some(bounds) = nodes.iter().map(Node::bounds).reduce(|a, b| a.union(&b)) else {
        return placeholder();
    };

    let scale = frame_scale(&bounds);
    let offset_x = (WIDTH - bounds.width() * scale) / 2.0 - bounds.min_x * scale;
    let offset_y = (HEIGHT - bounds.height() * scale) / 2.0 - bounds.min_y * scale;
    let project = |p: Position| Position::new(p.x * scale + offset_x, p.y * scale + offset_y);

    let centers: HashMap<&str, Position> = nodes
        .iter()
        .map(|n| (n.id.as_str(), project(n.center())))
        .collect();

    let mut svg = open_svg();
    for edge in edges {
        let (Some(a), Some(b)) = (
            centers.get(edge.source.as_str()),
            centers.get(edge.target.as_str()),
        ) else {
            continue;
        };
        let _ = write!(
            svg,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="1"/>"#,
            coord(a.x),
            coord(a.y),
            coord(b.x),
            coord(b.y),
            EDGE_STROKE
        );
    }
    for node in nodes {
        let origin = project(node.position);
        let size = node.effective_size();
        let _ = write!(
            svg,
            r#"<rect x="{}" y="{}" width="{}" height="{}" rx="2" fill="{}" stroke="{}" stroke-width="1"/>"#,
            coord(origin.x),
            coord(origin.y),
            coord(size.width * scale),
            coord(size.height * scale),
            NODE_FILL,
            NODE_STROKE
        );
    }
    svg.push_str("</svg>");
    svg
}

/// Shrink-only scale that leaves a margin around the graph
fn frame_scale(bounds: &Rect) -> f64 {
    let sx = if bounds.width() > 0.0 {
        WIDTH / bounds.width()
    } else {
        1.0
    };
    let sy = if bounds.height() > 0.0 {
        HEIGHT / bounds.height()
    } else {
        1.0
    };
    sx.min(sy).min(1.0) * FILL_RATIO
}

fn open_svg() -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = WIDTH,
        h = HEIGHT
    )
}

fn placeholder() -> String {
    let mut svg = open_svg();
    let _ = write!(
        svg,
        r#"<rect width="{}" height="{}" fill="{}"/><text x="{}" y="{}" text-anchor="middle" fill="{}" font-size="12">Empty template</text></svg>"#,
        WIDTH,
        HEIGHT,
        NODE_FILL,
        WIDTH / 2.0,
        HEIGHT / 2.0,
        NODE_STROKE
    );
    svg
}
