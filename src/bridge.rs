use crate::config::{ContainerOptions, LabelConfig};
use crate::dom::Dom;
use crate::host::{EventSource, GraphEvent, GraphEventKind, GraphHost, Handler};
use crate::registry::{OverlayRegistry, Payload};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

pub type SharedBridge<D> = Rc<RefCell<EventBridge<D>>>;

/// Turns graph lifecycle events into registry operations.
pub struct EventBridge<D: Dom> {
    configs: Vec<LabelConfig>,
    registry: OverlayRegistry<D>,
}

impl<D: Dom> EventBridge<D> {
    pub fn new(configs: Vec<LabelConfig>, registry: OverlayRegistry<D>) -> Self {
        Self { configs, registry }
    }

    pub fn configs(&self) -> &[LabelConfig] {
        &self.configs
    }

    pub fn registry(&self) -> &OverlayRegistry<D> {
        &self.registry
    }

    /// The last registered configuration whose query `id` satisfies.
    pub fn resolve<G>(&self, graph: &G, id: &str) -> Option<&LabelConfig>
    where
        G: GraphHost<D::Node> + ?Sized,
    {
        Self::resolve_in(&self.configs, graph, id)
    }

    fn resolve_in<'a, G>(configs: &'a [LabelConfig], graph: &G, id: &str) -> Option<&'a LabelConfig>
    where
        G: GraphHost<D::Node> + ?Sized,
    {
        configs
            .iter()
            .rev()
            .find(|config| graph.matches(id, &config.query))
    }

    fn payload<G>(graph: &G, id: &str) -> Payload
    where
        G: GraphHost<D::Node> + ?Sized,
    {
        Payload::new(graph.data(id).unwrap_or(Value::Null), graph.geometry(id))
    }

    /// Handles `event` right away, data and style changes included.
    pub fn handle<G>(&mut self, graph: &G, event: &GraphEvent)
    where
        G: GraphHost<D::Node> + ?Sized,
    {
        tracing::trace!(event = event.kind.name(), target = ?event.target, "overlay event");
        let target = event.target.as_deref();
        match (event.kind, target) {
            (GraphEventKind::Render, _) => self.render_all(graph),
            (GraphEventKind::Add, Some(id)) => self.add(graph, id),
            (GraphEventKind::Remove, Some(id)) => {
                self.registry.remove(id);
            }
            (GraphEventKind::Data | GraphEventKind::Style, Some(id)) => self.refresh(graph, id),
            (GraphEventKind::Position | GraphEventKind::Bounds, Some(id)) => {
                self.reposition(graph, id)
            }
            (GraphEventKind::LayoutStop, _) => self.reposition_all(graph),
            (GraphEventKind::Pan | GraphEventKind::Zoom, _) => {
                self.registry.sync_viewport(graph.viewport())
            }
            (kind, None) => tracing::trace!(event = kind.name(), "node event without target"),
        }
    }

    pub fn render_all<G>(&mut self, graph: &G)
    where
        G: GraphHost<D::Node> + ?Sized,
    {
        for id in graph.node_ids() {
            if let Some(config) = Self::resolve_in(&self.configs, graph, &id) {
                self.registry.upsert(graph, &id, config, Self::payload(graph, &id));
            }
        }
        self.registry.sync_viewport(graph.viewport());
    }

    pub fn add<G>(&mut self, graph: &G, id: &str)
    where
        G: GraphHost<D::Node> + ?Sized,
    {
        if let Some(config) = Self::resolve_in(&self.configs, graph, id) {
            self.registry.upsert(graph, id, config, Self::payload(graph, id));
        }
    }

    /// Re-reads `id` from the graph: kept and updated while it still matches
    /// a configuration, dropped otherwise.
    pub fn refresh<G>(&mut self, graph: &G, id: &str)
    where
        G: GraphHost<D::Node> + ?Sized,
    {
        match Self::resolve_in(&self.configs, graph, id) {
            Some(config) if !graph.removed(id) => {
                self.registry.upsert(graph, id, config, Self::payload(graph, id));
            }
            _ => {
                self.registry.remove(id);
            }
        }
    }

    pub fn reposition<G>(&mut self, graph: &G, id: &str)
    where
        G: GraphHost<D::Node> + ?Sized,
    {
        if let Some(geometry) = graph.geometry(id) {
            self.registry.reposition(graph, id, geometry);
        }
    }

    /// Repositions every node matching any configuration; content is untouched.
    pub fn reposition_all<G>(&mut self, graph: &G)
    where
        G: GraphHost<D::Node> + ?Sized,
    {
        for id in graph.node_ids() {
            if self.configs.iter().any(|config| graph.matches(&id, &config.query)) {
                self.reposition(graph, &id);
            }
        }
    }
}

/// Mounts the overlay container and subscribes to `source`.
///
/// Data and style changes are handled on the next turn of the host's task
/// queue, after the engine has finished its own batch of mutations.
pub fn node_html_label<D, S>(
    source: &mut S,
    dom: D,
    host_container: &D::Node,
    configs: Vec<LabelConfig>,
    options: &ContainerOptions,
) -> SharedBridge<D>
where
    D: Dom + 'static,
    S: EventSource<D::Node> + ?Sized,
{
    let registry = OverlayRegistry::mount(dom, host_container, options);
    let bridge = Rc::new(RefCell::new(EventBridge::new(configs, registry)));

    source.one(GraphEventKind::Render, immediate(&bridge));
    source.on(&[GraphEventKind::Add], immediate(&bridge));
    source.on(&[GraphEventKind::LayoutStop], immediate(&bridge));
    source.on(&[GraphEventKind::Remove], immediate(&bridge));
    source.on(&[GraphEventKind::Data, GraphEventKind::Style], deferred(&bridge));
    source.on(&[GraphEventKind::Pan, GraphEventKind::Zoom], immediate(&bridge));
    source.on(&[GraphEventKind::Position, GraphEventKind::Bounds], immediate(&bridge));
    bridge
}

/// `node_html_label` in chaining position on the host.
pub trait NodeHtmlLabelExt<N>: EventSource<N> {
    fn node_html_label<D>(
        &mut self,
        dom: D,
        host_container: &N,
        configs: Vec<LabelConfig>,
        options: &ContainerOptions,
    ) -> &mut Self
    where
        D: Dom<Node = N> + 'static,
        Self: Sized,
    {
        crate::bridge::node_html_label(self, dom, host_container, configs, options);
        self
    }
}

impl<N, S: EventSource<N> + ?Sized> NodeHtmlLabelExt<N> for S {}

fn immediate<D: Dom + 'static>(bridge: &SharedBridge<D>) -> Handler<D::Node> {
    let bridge = Rc::clone(bridge);
    Box::new(move |graph: &dyn GraphHost<D::Node>, event: &GraphEvent| {
        match bridge.try_borrow_mut() {
            Ok(mut active) => active.handle(graph, event),
            Err(_) => {
                tracing::warn!(event = event.kind.name(), "re-entrant overlay event, deferring");
                defer_event(&bridge, graph, event.clone());
            }
        }
    })
}

fn deferred<D: Dom + 'static>(bridge: &SharedBridge<D>) -> Handler<D::Node> {
    let bridge = Rc::clone(bridge);
    Box::new(move |graph: &dyn GraphHost<D::Node>, event: &GraphEvent| {
        defer_event(&bridge, graph, event.clone())
    })
}

fn defer_event<D: Dom + 'static>(
    bridge: &SharedBridge<D>,
    graph: &dyn GraphHost<D::Node>,
    event: GraphEvent,
) {
    let bridge = Rc::clone(bridge);
    graph.defer(Box::new(move |graph: &dyn GraphHost<D::Node>| match bridge.try_borrow_mut() {
        Ok(mut active) => active.handle(graph, &event),
        Err(_) => tracing::warn!(event = event.kind.name(), "overlay bridge busy, event dropped"),
    }));
}
