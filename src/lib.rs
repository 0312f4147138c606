//! HTML overlays for graph nodes.
//!
//! Each selected node gets an absolutely positioned element inside a shared
//! container that tracks the node's model position. The container itself
//! follows the viewport pan and zoom, so overlays scale with the graph.

pub mod bridge;
pub mod config;
pub mod dom;
pub mod element;
pub mod error;
pub mod host;
pub mod overlay_dump;
pub mod registry;
pub mod selector;
pub mod template;

pub use bridge::{EventBridge, NodeHtmlLabelExt, SharedBridge, node_html_label};
pub use config::{
    ContainerOptions, HAlign, LabelConfig, OverlayConfig, VAlign, labels_from_value, load_config,
    parse_config,
};
pub use dom::Dom;
pub use element::OverlayElement;
pub use error::{Error, Result};
pub use host::{
    EventSource, Geometry, GraphEvent, GraphEventKind, GraphHost, LabelSink, LabelUpdate, Viewport,
};
pub use registry::{OverlayRegistry, Payload};
pub use template::Template;
