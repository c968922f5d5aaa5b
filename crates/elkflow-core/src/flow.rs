//! Flow tags: the vocabulary marks use to describe what changed.

/// A fresh tree arrived.
pub const NEW: &str = "new";
/// Coordinates or sizes were assigned.
pub const LAYOUT: &str = "layout";

pub mod label {
    pub const TEXT: &str = "label.text";
    pub const SIZE_CSS: &str = "label.properties.cssClasses-size";
    pub const COLOR_CSS: &str = "label.properties.cssClasses-colors";
    pub const SIZE: &str = "label.size";
    pub const LAYOUT_OPTIONS: &str = "label.layoutOptions";
    pub const LABELS: &str = "label.labels";
    pub const HIDDEN: &str = "label.properties.hidden";
}

pub mod node {
    pub const SIZE: &str = "node.size";
    pub const CHILDREN: &str = "node.children";
    pub const SIZE_CSS: &str = "node.properties.cssClasses-size";
    pub const COLOR_CSS: &str = "node.properties.cssClasses-colors";
    pub const LAYOUT_OPTIONS: &str = "node.layoutOptions";
    pub const LABELS: &str = "node.labels";
    pub const EDGES: &str = "node.edges";
    pub const HIDDEN: &str = "node.properties.hidden";
    pub const PORTS: &str = "node.ports";
}

pub mod edge {
    pub const SIZE_CSS: &str = "edge.properties.cssClasses-size";
    pub const COLOR_CSS: &str = "edge.properties.cssClasses-colors";
    pub const LAYOUT_OPTIONS: &str = "edge.layoutOptions";
    pub const LABELS: &str = "edge.labels";
    pub const ROUTE: &str = "edge.sections";
    pub const SOURCE: &str = "edge.sources";
    pub const TARGET: &str = "edge.targets";
    pub const HIDDEN: &str = "edge.properties.hidden";
}

pub mod port {
    pub const SIZE: &str = "port.size";
    pub const SIZE_CSS: &str = "port.properties.cssClasses-size";
    pub const COLOR_CSS: &str = "port.properties.cssClasses-colors";
    pub const LAYOUT_OPTIONS: &str = "port.layoutOptions";
    pub const LABELS: &str = "port.labels";
    pub const HIDDEN: &str = "port.properties.hidden";
}
