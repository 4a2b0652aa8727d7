//! Engine-wide constants
//!
//! Single source of truth for geometry defaults, history limits and
//! routing parameters.

/// Default values for the document model
pub mod defaults {
    /// Node width used when a node has no explicit size
    pub const NODE_WIDTH: f64 = 150.0;
    /// Node height used when a node has no explicit size
    pub const NODE_HEIGHT: f64 = 80.0;
    /// Canvas grid spacing
    pub const GRID_SIZE: f64 = 15.0;
    /// Dash array for edges connecting a group node to its members
    pub const GROUP_EDGE_DASH: &str = "5,5";
    /// Offset applied when cloning a node
    pub const CLONE_OFFSET: f64 = 50.0;
    /// Suffix appended to a cloned node's label
    pub const CLONE_SUFFIX: &str = " (copy)";
}

/// Undo/redo history
pub mod history {
    /// Maximum number of snapshots kept in the past sequence
    pub const LIMIT: usize = 50;
    /// zstd level for snapshot compression
    pub const COMPRESSION_LEVEL: i32 = 3;
}

/// Viewport behavior
pub mod viewport {
    pub const MIN_ZOOM: f64 = 0.1;
    pub const MAX_ZOOM: f64 = 3.0;
    /// Multiplier applied by zoom in, divisor for zoom out
    pub const ZOOM_STEP: f64 = 1.2;
    /// Reference canvas size for fit-to-screen
    pub const FIT_WIDTH: f64 = 800.0;
    pub const FIT_HEIGHT: f64 = 600.0;
    /// Margin kept around the content when fitting
    pub const FIT_PADDING: f64 = 50.0;
}

/// Connector routing
pub mod routing {
    /// Clearance kept between a detour and an obstacle
    pub const OBSTACLE_PADDING: f64 = 20.0;
    /// Radius of smoothed bends
    pub const CORNER_RADIUS: f64 = 8.0;
    /// Cost of one bend, in canvas units of length
    pub const BEND_PENALTY: f64 = 40.0;
    /// Upper bound on search expansions per port pair
    pub const MAX_ITERATIONS: usize = 20_000;
    /// Coordinates closer than this are treated as equal
    pub const EPSILON: f64 = 1e-6;
}
