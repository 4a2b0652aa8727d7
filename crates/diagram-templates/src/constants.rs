//! Template service constants

/// Keys under which the two collections are stored
pub mod storage {
    pub const TEMPLATES_KEY: &str = "diagram_templates";
    pub const USAGE_STATS_KEY: &str = "template_usage_stats";
}

pub mod search {
    pub const DEFAULT_PAGE_SIZE: usize = 20;
}

pub mod thumbnail {
    pub const WIDTH: f64 = 200.0;
    pub const HEIGHT: f64 = 150.0;
    /// Share of the frame the scaled graph may occupy
    pub const FILL_RATIO: f64 = 0.8;
    pub const NODE_FILL: &str = "#e2e8f0";
    pub const NODE_STROKE: &str = "#64748b";
    pub const EDGE_STROKE: &str = "#94a3b8";
}

pub mod export {
    pub const FORMAT: &str = "diagram-template";
    pub const FORMAT_VERSION: u32 = 1;
}

pub mod catalog {
    pub const SYSTEM_AUTHOR: &str = "System";
    /// Author recorded when a template is created without one
    pub const USER_AUTHOR: &str = "User";
    pub const DUPLICATE_PREFIX: &str = "Copy of: ";
    pub const DUPLICATE_TAG: &str = "copy";
    pub const MIN_RATING: u8 = 1;
    pub const MAX_RATING: u8 = 5;
}
