//! Boundary with the graph engine that owns nodes, geometry and events.

pub mod memory;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the event a host re-publishes overlay updates under.
pub const LABEL_UPDATED_EVENT: &str = "htmlLabelUpdated";

/// Node box in model coordinates; `x`/`y` is the node centre.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub pan: Point,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            pan: Point::default(),
            zoom: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphEventKind {
    Render,
    Add,
    Remove,
    Data,
    Style,
    Position,
    Bounds,
    LayoutStop,
    Pan,
    Zoom,
}

impl GraphEventKind {
    pub const ALL: [GraphEventKind; 10] = [
        Self::Render,
        Self::Add,
        Self::Remove,
        Self::Data,
        Self::Style,
        Self::Position,
        Self::Bounds,
        Self::LayoutStop,
        Self::Pan,
        Self::Zoom,
    ];

    /// Event name as the engine spells it.
    pub fn name(self) -> &'static str {
        match self {
            Self::Render => "render",
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Data => "data",
            Self::Style => "style",
            Self::Position => "position",
            Self::Bounds => "bounds",
            Self::LayoutStop => "layoutstop",
            Self::Pan => "pan",
            Self::Zoom => "zoom",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphEvent {
    pub kind: GraphEventKind,
    /// Node the event concerns; `None` for graph-wide events.
    pub target: Option<String>,
}

impl GraphEvent {
    pub fn graph(kind: GraphEventKind) -> Self {
        Self { kind, target: None }
    }

    pub fn node(kind: GraphEventKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            target: Some(id.into()),
        }
    }
}

/// Overlay state published after an overlay is created or repositioned.
#[derive(Debug)]
pub struct LabelUpdate<'a, N> {
    pub id: &'a str,
    /// False only for the notification that follows creation.
    pub is_update: bool,
    pub geometry: Option<Geometry>,
    pub data: &'a Value,
    pub node: &'a N,
}

pub trait LabelSink<N> {
    fn emit(&self, update: LabelUpdate<'_, N>);
}

/// Work scheduled for the next turn of the host's task queue.
pub type Task<N> = Box<dyn FnOnce(&dyn GraphHost<N>)>;

pub type Handler<N> = Box<dyn FnMut(&dyn GraphHost<N>, &GraphEvent)>;

/// Read access to live graph state. Lookups on unknown ids return `None`.
pub trait GraphHost<N>: LabelSink<N> {
    /// Ids of all live nodes in graph order.
    fn node_ids(&self) -> Vec<String>;

    /// Whether node `id` satisfies the engine's selector `query`.
    fn matches(&self, id: &str, query: &str) -> bool;

    fn data(&self, id: &str) -> Option<Value>;

    fn geometry(&self, id: &str) -> Option<Geometry>;

    fn removed(&self, id: &str) -> bool;

    fn viewport(&self) -> Viewport;

    fn defer(&self, task: Task<N>);
}

pub trait EventSource<N> {
    fn on(&mut self, kinds: &[GraphEventKind], handler: Handler<N>);

    /// Like `on`, but the handler is dropped after its first call.
    fn one(&mut self, kind: GraphEventKind, handler: Handler<N>);
}
