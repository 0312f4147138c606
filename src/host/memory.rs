//! A headless graph engine: a node store with selector matching, synchronous
//! event dispatch and an explicit task queue standing in for the event loop.

use super::{
    EventSource, Geometry, GraphEvent, GraphEventKind, GraphHost, Handler, LabelSink, LabelUpdate,
    Point, Task, Viewport,
};
use crate::selector::{Selectable, Selector};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryNode {
    pub id: String,
    pub classes: Vec<String>,
    /// Always an object carrying at least `id`.
    pub data: Value,
    pub position: Point,
    pub width: f64,
    pub height: f64,
}

impl MemoryNode {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let mut data = Map::new();
        data.insert("id".to_string(), Value::String(id.clone()));
        Self {
            id,
            classes: Vec::new(),
            data: Value::Object(data),
            position: Point::default(),
            width: 30.0,
            height: 30.0,
        }
    }

    /// Merges the fields of `data` into the node data; `id` is kept.
    pub fn with_data(mut self, data: Value) -> Self {
        if let (Value::Object(target), Value::Object(fields)) = (&mut self.data, data) {
            for (key, value) in fields {
                if key != "id" {
                    target.insert(key, value);
                }
            }
        }
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Point { x, y };
        self
    }

    pub fn sized(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn geometry(&self) -> Geometry {
        Geometry {
            x: self.position.x,
            y: self.position.y,
            w: self.width,
            h: self.height,
        }
    }
}

impl Selectable for MemoryNode {
    fn tag(&self) -> &str {
        "node"
    }

    fn element_id(&self) -> Option<&str> {
        Some(self.id.as_str())
    }

    fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.data.get(name).cloned()
    }
}

/// Owned copy of a [`LabelUpdate`] as seen on the host's bus.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedLabel<N> {
    pub id: String,
    pub is_update: bool,
    pub geometry: Option<Geometry>,
    pub data: Value,
    pub node: N,
}

struct Subscription<N> {
    kinds: Vec<GraphEventKind>,
    once: bool,
    handler: Handler<N>,
}

pub struct MemoryGraph<N> {
    nodes: RefCell<IndexMap<String, MemoryNode>>,
    viewport: Cell<Viewport>,
    subscriptions: RefCell<Vec<Subscription<N>>>,
    pending_events: RefCell<VecDeque<GraphEvent>>,
    dispatching: Cell<bool>,
    tasks: RefCell<VecDeque<Task<N>>>,
    selectors: RefCell<HashMap<String, Option<Selector>>>,
    labels: RefCell<Vec<EmittedLabel<N>>>,
}

impl<N> Default for MemoryGraph<N> {
    fn default() -> Self {
        Self {
            nodes: RefCell::new(IndexMap::new()),
            viewport: Cell::new(Viewport::default()),
            subscriptions: RefCell::new(Vec::new()),
            pending_events: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
            tasks: RefCell::new(VecDeque::new()),
            selectors: RefCell::new(HashMap::new()),
            labels: RefCell::new(Vec::new()),
        }
    }
}

impl<N: Clone + 'static> MemoryGraph<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts nodes without raising `add`, as a graph built before any
    /// listener is attached.
    pub fn with_nodes(nodes: impl IntoIterator<Item = MemoryNode>) -> Self {
        let graph = Self::default();
        graph
            .nodes
            .borrow_mut()
            .extend(nodes.into_iter().map(|node| (node.id.clone(), node)));
        graph
    }

    pub fn node(&self, id: &str) -> Option<MemoryNode> {
        self.nodes.borrow().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    /// Raises the one-shot `render` event.
    pub fn render(&self) {
        self.dispatch(GraphEvent::graph(GraphEventKind::Render));
    }

    /// Adds or replaces a node and raises `add`.
    pub fn add_node(&self, node: MemoryNode) {
        let id = node.id.clone();
        self.nodes.borrow_mut().insert(id.clone(), node);
        self.dispatch(GraphEvent::node(GraphEventKind::Add, id));
    }

    pub fn remove_node(&self, id: &str) {
        if self.nodes.borrow_mut().shift_remove(id).is_some() {
            self.dispatch(GraphEvent::node(GraphEventKind::Remove, id));
        }
    }

    pub fn set_data(&self, id: &str, key: &str, value: Value) {
        self.update(id, GraphEventKind::Data, |node| {
            if key != "id" {
                if let Value::Object(map) = &mut node.data {
                    map.insert(key.to_string(), value);
                }
            }
        });
    }

    pub fn remove_data(&self, id: &str, key: &str) {
        self.update(id, GraphEventKind::Data, |node| {
            if let Value::Object(map) = &mut node.data {
                map.remove(key);
            }
        });
    }

    pub fn add_class(&self, id: &str, class: &str) {
        self.update(id, GraphEventKind::Style, |node| {
            if !node.has_class(class) {
                node.classes.push(class.to_string());
            }
        });
    }

    pub fn remove_class(&self, id: &str, class: &str) {
        self.update(id, GraphEventKind::Style, |node| {
            node.classes.retain(|c| c != class);
        });
    }

    pub fn move_node(&self, id: &str, x: f64, y: f64) {
        self.update(id, GraphEventKind::Position, |node| {
            node.position = Point { x, y };
        });
    }

    pub fn resize_node(&self, id: &str, width: f64, height: f64) {
        self.update(id, GraphEventKind::Bounds, |node| {
            node.width = width;
            node.height = height;
        });
    }

    /// Applies positions the way a layout run does: silently, followed by a
    /// single `layoutstop`.
    pub fn run_layout(&self, positions: impl IntoIterator<Item = (String, Point)>) {
        {
            let mut nodes = self.nodes.borrow_mut();
            for (id, position) in positions {
                if let Some(node) = nodes.get_mut(&id) {
                    node.position = position;
                }
            }
        }
        self.dispatch(GraphEvent::graph(GraphEventKind::LayoutStop));
    }

    pub fn pan_to(&self, x: f64, y: f64) {
        let mut viewport = self.viewport.get();
        viewport.pan = Point { x, y };
        self.viewport.set(viewport);
        self.dispatch(GraphEvent::graph(GraphEventKind::Pan));
    }

    pub fn zoom_to(&self, zoom: f64) {
        let mut viewport = self.viewport.get();
        viewport.zoom = zoom;
        self.viewport.set(viewport);
        self.dispatch(GraphEvent::graph(GraphEventKind::Zoom));
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Runs queued tasks, including ones they schedule, until the queue is
    /// empty. Returns how many ran.
    pub fn run_tasks(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.tasks.borrow_mut().pop_front();
            let Some(task) = next else {
                break;
            };
            task(self);
            ran += 1;
        }
        ran
    }

    pub fn labels(&self) -> Vec<EmittedLabel<N>> {
        self.labels.borrow().clone()
    }

    pub fn take_labels(&self) -> Vec<EmittedLabel<N>> {
        std::mem::take(&mut *self.labels.borrow_mut())
    }

    fn update(&self, id: &str, kind: GraphEventKind, apply: impl FnOnce(&mut MemoryNode)) {
        let found = match self.nodes.borrow_mut().get_mut(id) {
            Some(node) => {
                apply(node);
                true
            }
            None => false,
        };
        if found {
            self.dispatch(GraphEvent::node(kind, id));
        }
    }

    /// Delivers `event` to subscribers. Events raised while handlers run are
    /// queued and delivered once the current one has been handled.
    fn dispatch(&self, event: GraphEvent) {
        self.pending_events.borrow_mut().push_back(event);
        if self.dispatching.replace(true) {
            return;
        }
        loop {
            let next = self.pending_events.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            tracing::trace!(event = event.kind.name(), target = ?event.target, "dispatch");
            let mut active = std::mem::take(&mut *self.subscriptions.borrow_mut());
            active.retain_mut(|sub| {
                if !sub.kinds.contains(&event.kind) {
                    return true;
                }
                (sub.handler)(self, &event);
                !sub.once
            });
            let mut subscriptions = self.subscriptions.borrow_mut();
            let added = std::mem::replace(&mut *subscriptions, active);
            subscriptions.extend(added);
        }
        self.dispatching.set(false);
    }
}

impl<N: Clone + 'static> LabelSink<N> for MemoryGraph<N> {
    fn emit(&self, update: LabelUpdate<'_, N>) {
        self.labels.borrow_mut().push(EmittedLabel {
            id: update.id.to_string(),
            is_update: update.is_update,
            geometry: update.geometry,
            data: update.data.clone(),
            node: update.node.clone(),
        });
    }
}

impl<N: Clone + 'static> GraphHost<N> for MemoryGraph<N> {
    fn node_ids(&self) -> Vec<String> {
        self.nodes.borrow().keys().cloned().collect()
    }

    fn matches(&self, id: &str, query: &str) -> bool {
        let nodes = self.nodes.borrow();
        let Some(node) = nodes.get(id) else {
            return false;
        };
        let mut selectors = self.selectors.borrow_mut();
        let selector = selectors
            .entry(query.to_string())
            .or_insert_with(|| match Selector::parse(query) {
                Ok(selector) => Some(selector),
                Err(err) => {
                    tracing::warn!(error = %err, "selector never matches");
                    None
                }
            });
        selector.as_ref().is_some_and(|selector| selector.matches(node))
    }

    fn data(&self, id: &str) -> Option<Value> {
        self.nodes.borrow().get(id).map(|node| node.data.clone())
    }

    fn geometry(&self, id: &str) -> Option<Geometry> {
        self.nodes.borrow().get(id).map(MemoryNode::geometry)
    }

    fn removed(&self, id: &str) -> bool {
        !self.nodes.borrow().contains_key(id)
    }

    fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    fn defer(&self, task: Task<N>) {
        self.tasks.borrow_mut().push_back(task);
    }
}

impl<N: Clone + 'static> EventSource<N> for MemoryGraph<N> {
    fn on(&mut self, kinds: &[GraphEventKind], handler: Handler<N>) {
        self.subscriptions.get_mut().push(Subscription {
            kinds: kinds.to_vec(),
            once: false,
            handler,
        });
    }

    fn one(&mut self, kind: GraphEventKind, handler: Handler<N>) {
        self.subscriptions.get_mut().push(Subscription {
            kinds: vec![kind],
            once: true,
            handler,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::rc::Rc;

    fn graph() -> MemoryGraph<u32> {
        MemoryGraph::with_nodes([
            MemoryNode::new("a").with_data(json!({"order": 2})).at(10.0, 20.0),
            MemoryNode::new("b").with_class("special"),
        ])
    }

    #[test]
    fn matches_uses_selectors() {
        let graph = graph();
        assert!(graph.matches("a", "node"));
        assert!(graph.matches("a", "[order = 2]"));
        assert!(!graph.matches("a", "node.special"));
        assert!(graph.matches("b", "node.special"));
        assert!(!graph.matches("b", "node[["));
        assert!(!graph.matches("zz", "node"));
    }

    #[test]
    fn handlers_see_events_and_one_fires_once() {
        let mut graph = graph();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        graph.on(
            &[GraphEventKind::Add, GraphEventKind::Data],
            Box::new(move |host: &dyn GraphHost<u32>, event: &GraphEvent| {
                let id = event.target.clone().unwrap_or_default();
                log.borrow_mut().push((event.kind, id.clone(), host.data(&id)));
            }),
        );
        let renders = Rc::new(Cell::new(0));
        let counter = renders.clone();
        graph.one(
            GraphEventKind::Render,
            Box::new(move |_: &dyn GraphHost<u32>, _: &GraphEvent| counter.set(counter.get() + 1)),
        );

        graph.render();
        graph.render();
        graph.add_node(MemoryNode::new("c"));
        graph.set_data("c", "order", json!(5));
        graph.set_data("missing", "order", json!(1));

        assert_eq!(renders.get(), 1);
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, GraphEventKind::Add);
        assert_eq!(seen[1].2.as_ref().unwrap()["order"], json!(5));
    }

    #[test]
    fn handlers_run_in_subscription_order() {
        let mut graph = graph();
        let order = Rc::new(RefCell::new(Vec::new()));
        let first = order.clone();
        graph.on(
            &[GraphEventKind::Pan, GraphEventKind::Zoom],
            Box::new(move |_: &dyn GraphHost<u32>, event: &GraphEvent| first.borrow_mut().push(("first", event.kind))),
        );
        let second = order.clone();
        graph.on(
            &[GraphEventKind::Pan],
            Box::new(move |host: &dyn GraphHost<u32>, event: &GraphEvent| {
                assert_eq!(host.viewport().pan, Point { x: 5.0, y: 5.0 });
                second.borrow_mut().push(("second", event.kind));
            }),
        );
        graph.pan_to(5.0, 5.0);
        graph.zoom_to(2.0);
        assert_eq!(
            *order.borrow(),
            vec![
                ("first", GraphEventKind::Pan),
                ("second", GraphEventKind::Pan),
                ("first", GraphEventKind::Zoom),
            ]
        );
        assert_eq!(graph.viewport().zoom, 2.0);
    }

    #[test]
    fn tasks_run_in_order_and_can_chain() {
        let graph = graph();
        let ran = Rc::new(RefCell::new(Vec::new()));
        let first = ran.clone();
        graph.defer(Box::new(move |host: &dyn GraphHost<u32>| {
            first.borrow_mut().push("first");
            let chained = first.clone();
            host.defer(Box::new(move |_: &dyn GraphHost<u32>| chained.borrow_mut().push("chained")));
        }));
        let second = ran.clone();
        graph.defer(Box::new(move |_: &dyn GraphHost<u32>| second.borrow_mut().push("second")));
        assert_eq!(graph.pending_tasks(), 2);
        assert_eq!(graph.run_tasks(), 3);
        assert_eq!(*ran.borrow(), vec!["first", "second", "chained"]);
    }

    #[test]
    fn removal_and_layout() {
        let graph = graph();
        graph.run_layout([("a".to_string(), Point { x: 1.0, y: 2.0 })]);
        assert_eq!(graph.geometry("a").unwrap().x, 1.0);
        graph.remove_node("a");
        assert!(graph.removed("a"));
        assert_eq!(graph.node_ids(), vec!["b".to_string()]);
        assert_eq!(graph.geometry("a"), None);
    }
}
