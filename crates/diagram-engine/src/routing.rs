//! Connector routing between nodes
//!
//! Routes are computed from node geometry alone, so they can be recomputed
//! after any move. Each node exposes four connection ports (the midpoints of
//! its sides). The router:
//!
//! 1. Ranks every source/target port pair by distance.
//! 2. Builds a simple route for the closest pair, an elbow when orthogonal
//!    routing is preferred or a straight line otherwise.
//! 3. If obstacle avoidance is enabled and that route crosses another node,
//!    searches an orthogonal visibility grid built around the padded
//!    obstacles, minimizing length plus a penalty per bend.
//! 4. Falls back to the direct line when no detour exists. The route is
//!    still flagged as obstructed in that case.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::constants::routing as limits;
use crate::types::{Edge, EdgeKind, GraphDocument, Node, Position, Rect, RoutingInfo};

const EPS: f64 = limits::EPSILON;

/// Routing behavior switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingOptions {
    #[serde(default = "enabled")]
    pub avoid_obstacles: bool,
    #[serde(default = "enabled")]
    pub prefer_orthogonal: bool,
    #[serde(default = "enabled")]
    pub smooth_curves: bool,
    #[serde(default = "default_padding")]
    pub obstacle_padding: f64,
    #[serde(default = "default_corner_radius")]
    pub corner_radius: f64,
    #[serde(default = "default_bend_penalty")]
    pub bend_penalty: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn enabled() -> bool {
    true
}

fn default_padding() -> f64 {
    limits::OBSTACLE_PADDING
}

fn default_corner_radius() -> f64 {
    limits::CORNER_RADIUS
}

fn default_bend_penalty() -> f64 {
    limits::BEND_PENALTY
}

fn default_max_iterations() -> usize {
    limits::MAX_ITERATIONS
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            avoid_obstacles: true,
            prefer_orthogonal: true,
            smooth_curves: true,
            obstacle_padding: default_padding(),
            corner_radius: default_corner_radius(),
            bend_penalty: default_bend_penalty(),
            max_iterations: default_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentDirection {
    Horizontal,
    Vertical,
    Diagonal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathSegment {
    pub start: Position,
    pub end: Position,
    pub direction: SegmentDirection,
    pub length: f64,
}

impl PathSegment {
    fn between(start: Position, end: Position) -> Self {
        let direction = if (start.y - end.y).abs() < EPS {
            SegmentDirection::Horizontal
        } else if (start.x - end.x).abs() < EPS {
            SegmentDirection::Vertical
        } else {
            SegmentDirection::Diagonal
        };
        Self {
            start,
            end,
            direction,
            length: start.distance(end),
        }
    }
}

/// Computed connector geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Polyline through the bend points, endpoints on the node borders
    pub path: Vec<Position>,
    /// SVG path data; bends are `Q` curves when smoothing is enabled
    pub path_string: String,
    pub total_length: f64,
    /// Whether the simple route was obstructed by another node
    pub has_obstacles: bool,
    pub segments: Vec<PathSegment>,
}

impl Route {
    pub fn start(&self) -> Option<Position> {
        self.path.first().copied()
    }

    pub fn end(&self) -> Option<Position> {
        self.path.last().copied()
    }

    pub fn routing_info(&self) -> RoutingInfo {
        RoutingInfo {
            total_length: self.total_length,
            has_obstacles: self.has_obstacles,
            segment_count: self.segments.len(),
            routed_at: Utc::now(),
        }
    }

    /// Store this route as the edge's cached geometry
    pub fn apply_to(&self, edge: &mut Edge) {
        edge.data.path = Some(self.path_string.clone());
        edge.data.routing = Some(self.routing_info());
    }
}

// ─── PORTS ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Right, Side::Bottom, Side::Left];

    fn outward(self) -> Heading {
        match self {
            Side::Top => Heading::Up,
            Side::Right => Heading::Right,
            Side::Bottom => Heading::Down,
            Side::Left => Heading::Left,
        }
    }

    fn is_horizontal(self) -> bool {
        matches!(self, Side::Left | Side::Right)
    }
}

/// A connection point on a node border
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Port {
    pub side: Side,
    pub point: Position,
}

impl Port {
    pub fn on(rect: &Rect, side: Side) -> Self {
        let center = rect.center();
        let point = match side {
            Side::Top => Position::new(center.x, rect.min_y),
            Side::Right => Position::new(rect.max_x, center.y),
            Side::Bottom => Position::new(center.x, rect.max_y),
            Side::Left => Position::new(rect.min_x, center.y),
        };
        Self { side, point }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Heading {
    Up,
    Down,
    Left,
    Right,
}

impl Heading {
    const ALL: [Heading; 4] = [Heading::Up, Heading::Down, Heading::Left, Heading::Right];

    fn index(self) -> usize {
        self as usize
    }

    fn opposite(self) -> Heading {
        match self {
            Heading::Up => Heading::Down,
            Heading::Down => Heading::Up,
            Heading::Left => Heading::Right,
            Heading::Right => Heading::Left,
        }
    }
}

// ─── ENGINE ─────────────────────────────────────────────────────────────────

/// Stateless route calculator
#[derive(Debug, Clone, Default)]
pub struct RoutingEngine {
    options: RoutingOptions,
}

impl RoutingEngine {
    pub fn new(options: RoutingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RoutingOptions {
        &self.options
    }

    /// Route from `source` to `target`, treating every other node in `nodes` as an obstacle
    pub fn generate_route(&self, source: &Node, target: &Node, nodes: &[Node]) -> Route {
        route_between(&self.options, source, target, nodes)
    }

    /// Route an existing edge of `doc`; `None` if an endpoint is missing
    ///
    /// Straight edges are routed as direct lines without smoothing.
    pub fn route_edge(&self, doc: &GraphDocument, edge: &Edge) -> Option<Route> {
        let source = doc.find_node(&edge.source)?;
        let target = doc.find_node(&edge.target)?;
        let route = match edge.kind {
            EdgeKind::OrthogonalSmoothed => route_between(&self.options, source, target, &doc.nodes),
            EdgeKind::Straight => {
                let options = RoutingOptions {
                    prefer_orthogonal: false,
                    smooth_curves: false,
                    ..self.options.clone()
                };
                route_between(&options, source, target, &doc.nodes)
            }
        };
        Some(route)
    }

    /// Recompute the cached geometry of every edge in place
    ///
    /// Returns the number of edges routed.
    pub fn route_all(&self, doc: &mut GraphDocument) -> usize {
        let current: &GraphDocument = doc;
        let routes: Vec<(usize, Route)> = current
            .edges
            .iter()
            .enumerate()
            .filter_map(|(i, edge)| self.route_edge(current, edge).map(|route| (i, route)))
            .collect();
        let count = routes.len();
        for (i, route) in routes {
            route.apply_to(&mut doc.edges[i]);
        }
        count
    }

    /// The closest pair of connection points between two nodes
    pub fn best_connection_points(&self, source: &Node, target: &Node) -> (Port, Port) {
        candidate_pairs(&source.bounds(), &target.bounds())[0]
    }
}

fn route_between(options: &RoutingOptions, source: &Node, target: &Node, nodes: &[Node]) -> Route {
    let source_rect = source.bounds();
    let target_rect = target.bounds();
    let pairs = candidate_pairs(&source_rect, &target_rect);
    let (from, to) = pairs[0];
    let simple = simple_path(options, from, to);

    let obstacles: Vec<Rect> = if options.avoid_obstacles {
        nodes
            .iter()
            .filter(|n| n.id != source.id && n.id != target.id)
            .map(Node::bounds)
            .collect()
    } else {
        Vec::new()
    };

    if !path_hits_any(&simple, &obstacles) {
        return finish(options, simple, false);
    }

    let padded: Vec<Rect> = obstacles
        .iter()
        .map(|r| r.inflate(options.obstacle_padding))
        .collect();

    let mut search_rects = padded.clone();
    search_rects.push(source_rect);
    search_rects.push(target_rect);

    let mut guides = vec![
        source_rect,
        target_rect,
        source_rect.inflate(options.obstacle_padding),
        target_rect.inflate(options.obstacle_padding),
    ];
    guides.extend(padded.iter().copied());

    for (from, to) in &pairs {
        if padded
            .iter()
            .any(|r| r.contains_strict(from.point) || r.contains_strict(to.point))
        {
            continue;
        }
        if let Some(path) = search(options, *from, *to, &search_rects, &guides) {
            return finish(options, path, true);
        }
    }

    log::warn!(
        "No clear route from '{}' to '{}', falling back to a direct line",
        source.id,
        target.id
    );
    finish(options, vec![from.point, to.point], true)
}

/// All 16 port pairs, closest first; ties keep top/right/bottom/left order
fn candidate_pairs(source: &Rect, target: &Rect) -> Vec<(Port, Port)> {
    let mut pairs: Vec<(Port, Port)> = Side::ALL
        .iter()
        .flat_map(|&s| Side::ALL.iter().map(move |&t| (Port::on(source, s), Port::on(target, t))))
        .collect();
    pairs.sort_by(|a, b| {
        a.0.point
            .distance(a.1.point)
            .total_cmp(&b.0.point.distance(b.1.point))
    });
    pairs
}

fn simple_path(options: &RoutingOptions, from: Port, to: Port) -> Vec<Position> {
    let (a, b) = (from.point, to.point);
    let aligned = (a.x - b.x).abs() < EPS || (a.y - b.y).abs() < EPS;
    if !options.prefer_orthogonal || aligned {
        return vec![a, b];
    }

    match (from.side.is_horizontal(), to.side.is_horizontal()) {
        (true, true) => {
            let mid_x = (a.x + b.x) / 2.0;
            vec![a, Position::new(mid_x, a.y), Position::new(mid_x, b.y), b]
        }
        (false, false) => {
            let mid_y = (a.y + b.y) / 2.0;
            vec![a, Position::new(a.x, mid_y), Position::new(b.x, mid_y), b]
        }
        (true, false) => vec![a, Position::new(b.x, a.y), b],
        (false, true) => vec![a, Position::new(a.x, b.y), b],
    }
}

fn path_hits_any(path: &[Position], obstacles: &[Rect]) -> bool {
    path.windows(2)
        .any(|w| obstacles.iter().any(|r| r.intersects_segment(w[0], w[1])))
}

/// Whether an axis-aligned segment passes through the interior of `rect`
fn crosses_interior(rect: &Rect, a: Position, b: Position) -> bool {
    if (a.y - b.y).abs() < EPS {
        let (lo, hi) = (a.x.min(b.x), a.x.max(b.x));
        a.y > rect.min_y + EPS && a.y < rect.max_y - EPS && hi > rect.min_x + EPS && lo < rect.max_x - EPS
    } else {
        let (lo, hi) = (a.y.min(b.y), a.y.max(b.y));
        a.x > rect.min_x + EPS && a.x < rect.max_x - EPS && hi > rect.min_y + EPS && lo < rect.max_y - EPS
    }
}

fn inside_any(rects: &[Rect], p: Position) -> bool {
    rects.iter().any(|r| {
        p.x > r.min_x + EPS && p.x < r.max_x - EPS && p.y > r.min_y + EPS && p.y < r.max_y - EPS
    })
}

/// Sorted, deduplicated grid coordinates
fn axis(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(f64::total_cmp);
    values.dedup_by(|a, b| (*a - *b).abs() < EPS);
    values
}

fn index_of(values: &[f64], v: f64) -> Option<usize> {
    values.iter().position(|x| (x - v).abs() < EPS)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct QueueEntry {
    priority: f64,
    cost: f64,
    state: usize,
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.state.cmp(&self.state))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* over the orthogonal visibility grid
///
/// A state is a grid point plus the heading used to reach it, so bends can
/// be charged. The route must leave `from` and enter `to` perpendicular to
/// their sides.
fn search(
    options: &RoutingOptions,
    from: Port,
    to: Port,
    obstacles: &[Rect],
    guides: &[Rect],
) -> Option<Vec<Position>> {
    let (a, b) = (from.point, to.point);

    let mut xs = vec![a.x, b.x, (a.x + b.x) / 2.0];
    let mut ys = vec![a.y, b.y, (a.y + b.y) / 2.0];
    for rect in guides {
        xs.extend([rect.min_x, rect.max_x]);
        ys.extend([rect.min_y, rect.max_y]);
    }
    let xs = axis(xs);
    let ys = axis(ys);
    let (nx, ny) = (xs.len(), ys.len());

    let start = (index_of(&xs, a.x)?, index_of(&ys, a.y)?);
    let goal = (index_of(&xs, b.x)?, index_of(&ys, b.y)?);
    let exit_heading = from.side.outward();
    let entry_heading = to.side.outward().opposite();

    // Heading slot 4 marks the start state
    const SLOTS: usize = 5;
    let encode = |ix: usize, iy: usize, slot: usize| (iy * nx + ix) * SLOTS + slot;
    let decode = |state: usize| {
        let cell = state / SLOTS;
        (cell % nx, cell / nx, state % SLOTS)
    };
    let point = |ix: usize, iy: usize| Position::new(xs[ix], ys[iy]);
    let heuristic = |ix: usize, iy: usize| (xs[ix] - b.x).abs() + (ys[iy] - b.y).abs();

    let mut best = vec![f64::INFINITY; nx * ny * SLOTS];
    let mut previous: Vec<Option<usize>> = vec![None; nx * ny * SLOTS];
    let mut heap = BinaryHeap::new();

    let origin = encode(start.0, start.1, 4);
    best[origin] = 0.0;
    heap.push(QueueEntry {
        priority: heuristic(start.0, start.1),
        cost: 0.0,
        state: origin,
    });

    let mut iterations = 0;
    while let Some(QueueEntry { cost, state, .. }) = heap.pop() {
        iterations += 1;
        if iterations > options.max_iterations {
            log::debug!("Route search exceeded {} iterations", options.max_iterations);
            return None;
        }
        if cost > best[state] {
            continue;
        }

        let (ix, iy, slot) = decode(state);
        if (ix, iy) == goal && slot == entry_heading.index() {
            let mut points = Vec::new();
            let mut cursor = Some(state);
            while let Some(s) = cursor {
                let (cx, cy, _) = decode(s);
                points.push(point(cx, cy));
                cursor = previous[s];
            }
            points.reverse();
            return Some(points);
        }

        let last = Heading::ALL.get(slot).copied();
        for heading in Heading::ALL {
            match last {
                None if heading != exit_heading => continue,
                Some(h) if h == heading.opposite() => continue,
                _ => {}
            }

            let next = match heading {
                Heading::Up if iy > 0 => (ix, iy - 1),
                Heading::Down if iy + 1 < ny => (ix, iy + 1),
                Heading::Left if ix > 0 => (ix - 1, iy),
                Heading::Right if ix + 1 < nx => (ix + 1, iy),
                _ => continue,
            };

            let here = point(ix, iy);
            let there = point(next.0, next.1);
            if inside_any(obstacles, there) || obstacles.iter().any(|r| crosses_interior(r, here, there)) {
                continue;
            }

            let bend = match last {
                Some(h) if h != heading => options.bend_penalty,
                _ => 0.0,
            };
            let next_cost = cost + here.distance(there) + bend;
            let next_state = encode(next.0, next.1, heading.index());
            if next_cost + EPS < best[next_state] {
                best[next_state] = next_cost;
                previous[next_state] = Some(state);
                heap.push(QueueEntry {
                    priority: next_cost + heuristic(next.0, next.1),
                    cost: next_cost,
                    state: next_state,
                });
            }
        }
    }

    None
}

/// Drop repeated points and interior points of straight runs
fn simplify(points: Vec<Position>) -> Vec<Position> {
    let mut out: Vec<Position> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().is_some_and(|last| last.distance(p) < EPS) {
            continue;
        }
        if out.len() >= 2 {
            let a = out[out.len() - 2];
            let b = out[out.len() - 1];
            let cross = (b.x - a.x) * (p.y - b.y) - (b.y - a.y) * (p.x - b.x);
            let dot = (b.x - a.x) * (p.x - b.x) + (b.y - a.y) * (p.y - b.y);
            if cross.abs() < EPS && dot >= 0.0 {
                out.pop();
            }
        }
        out.push(p);
    }
    out
}

fn finish(options: &RoutingOptions, points: Vec<Position>, has_obstacles: bool) -> Route {
    let path = simplify(points);
    let segments: Vec<PathSegment> = path
        .windows(2)
        .map(|w| PathSegment::between(w[0], w[1]))
        .collect();
    let total_length = segments.iter().map(|s| s.length).sum();
    let radius = if options.smooth_curves {
        options.corner_radius
    } else {
        0.0
    };

    Route {
        path_string: path_string(&path, radius),
        path,
        total_length,
        has_obstacles,
        segments,
    }
}

/// SVG path data for a polyline; bends become quadratic curves of `radius`
pub fn path_string(points: &[Position], radius: f64) -> String {
    let Some(first) = points.first() else {
        return String::new();
    };
    let mut d = format!("M {} {}", coord(first.x), coord(first.y));

    for i in 1..points.len() {
        let corner = points[i];
        let is_bend = i + 1 < points.len();
        if !is_bend || radius <= EPS {
            d.push_str(&format!(" L {} {}", coord(corner.x), coord(corner.y)));
            continue;
        }

        let prev = points[i - 1];
        let next = points[i + 1];
        let len_in = prev.distance(corner);
        let len_out = corner.distance(next);
        let r = radius.min(len_in / 2.0).min(len_out / 2.0);
        if r <= EPS {
            d.push_str(&format!(" L {} {}", coord(corner.x), coord(corner.y)));
            continue;
        }

        let before = Position::new(
            corner.x - (corner.x - prev.x) / len_in * r,
            corner.y - (corner.y - prev.y) / len_in * r,
        );
        let after = Position::new(
            corner.x + (next.x - corner.x) / len_out * r,
            corner.y + (next.y - corner.y) / len_out * r,
        );
        d.push_str(&format!(
            " L {} {} Q {} {} {} {}",
            coord(before.x),
            coord(before.y),
            coord(corner.x),
            coord(corner.y),
            coord(after.x),
            coord(after.y)
        ));
    }
    d
}

/// Two-decimal coordinate without trailing zeros
pub fn coord(v: f64) -> String {
    let rounded = (v * 100.0).round() / 100.0;
    if rounded == 0.0 {
        "0".to_string()
    } else {
        format!("{}", rounded)
    }
}
