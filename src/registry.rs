use crate::config::{ContainerOptions, LabelConfig};
use crate::dom::Dom;
use crate::element::{NODE_ID_ATTRIBUTE, OverlayElement, order_of};
use crate::host::{Geometry, LabelSink, LabelUpdate, Viewport};
use serde_json::Value;
use std::collections::HashMap;

/// Class marking the overlay container, used to find a stale one on remount.
pub const CONTAINER_CLASS: &str = "cy-node-html";

const CONTAINER_STYLE: [(&str, &str); 7] = [
    ("position", "absolute"),
    ("z-index", "10"),
    ("width", "500px"),
    ("margin", "0px"),
    ("padding", "0px"),
    ("border", "0px"),
    ("outline", "0px"),
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub data: Value,
    pub position: Option<Geometry>,
}

impl Payload {
    pub fn new(data: Value, position: Option<Geometry>) -> Self {
        Self { data, position }
    }
}

/// Owns every overlay and the container they live in.
///
/// Container children are kept sorted by the numeric `order` field of each
/// overlay's data. Equal orders keep insertion order and overlays without an
/// order trail the ordered ones.
pub struct OverlayRegistry<D: Dom> {
    dom: D,
    container: D::Node,
    elements: HashMap<String, OverlayElement<D::Node>>,
}

impl<D: Dom> OverlayRegistry<D> {
    pub fn new(dom: D, container: D::Node) -> Self {
        Self {
            dom,
            container,
            elements: HashMap::new(),
        }
    }

    /// Creates the container as a sibling of the host's `canvas` (or inside
    /// `host_container` when it has none), replacing one left by an earlier
    /// mount.
    pub fn mount(dom: D, host_container: &D::Node, options: &ContainerOptions) -> Self {
        if let Some(stale) = dom.query_selector(host_container, &format!(".{CONTAINER_CLASS}")) {
            if let Some(parent) = dom.parent(&stale) {
                dom.remove_child(&parent, &stale);
                dom.release(&stale);
                tracing::debug!("removed stale overlay container");
            }
        }

        let parent = dom
            .query_selector(host_container, "canvas")
            .and_then(|canvas| dom.parent(&canvas))
            .unwrap_or_else(|| host_container.clone());

        let container = dom.create_element("div");
        dom.add_class(&container, CONTAINER_CLASS);
        for (property, value) in CONTAINER_STYLE {
            dom.set_style(&container, property, value);
        }
        if !options.enable_pointer_events {
            dom.set_style(&container, "pointer-events", "none");
        }
        dom.append_child(&parent, &container);
        Self::new(dom, container)
    }

    pub fn upsert<S>(&mut self, sink: &S, id: &str, config: &LabelConfig, payload: Payload)
    where
        S: LabelSink<D::Node> + ?Sized,
    {
        let new_order = order_of(&payload.data);

        if let Some(element) = self.elements.get_mut(id) {
            let old_order = element.order();
            element.apply_configuration(config);
            element.apply_data(&self.dom, payload.data);
            if let Some(position) = payload.position {
                element.apply_position(&self.dom, sink, position);
            }
            if new_order != old_order {
                let node = element.node().clone();
                self.dom.remove_child(&self.container, &node);
                self.insert_ordered(&node, new_order);
                tracing::debug!(id, ?old_order, ?new_order, "overlay reordered");
            }
            return;
        }

        let node = self.dom.create_element("div");
        self.insert_ordered(&node, new_order);
        let element = OverlayElement::new(
            &self.dom,
            sink,
            id,
            node,
            config,
            Some(payload.data),
            payload.position,
        );
        sink.emit(LabelUpdate {
            id,
            is_update: false,
            geometry: payload.position,
            data: element.data(),
            node: element.node(),
        });
        self.elements.insert(id.to_string(), element);
        tracing::debug!(id, order = ?new_order, "overlay created");
    }

    /// Returns whether an overlay was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.elements.remove(id) {
            Some(element) => {
                self.dom.remove_child(&self.container, element.node());
                self.dom.release(element.node());
                tracing::debug!(id, "overlay removed");
                true
            }
            None => {
                tracing::trace!(id, "remove ignored, no overlay");
                false
            }
        }
    }

    /// Returns whether an overlay exists for `id`.
    pub fn reposition<S>(&mut self, sink: &S, id: &str, geometry: Geometry) -> bool
    where
        S: LabelSink<D::Node> + ?Sized,
    {
        match self.elements.get_mut(id) {
            Some(element) => {
                element.apply_position(&self.dom, sink, geometry);
                true
            }
            None => {
                tracing::trace!(id, "reposition ignored, no overlay");
                false
            }
        }
    }

    /// Moves and scales the whole container; overlay transforms are untouched.
    pub fn sync_viewport(&self, viewport: Viewport) {
        let transform = format!(
            "translate({}px,{}px) scale({})",
            viewport.pan.x, viewport.pan.y, viewport.zoom
        );
        self.dom.set_style(&self.container, "transform", &transform);
        self.dom.set_style(&self.container, "transform-origin", "top left");
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn container(&self) -> &D::Node {
        &self.container
    }

    pub fn get(&self, id: &str) -> Option<&OverlayElement<D::Node>> {
        self.elements.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.elements.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Overlay ids in container order.
    pub fn ids(&self) -> Vec<String> {
        self.dom
            .children(&self.container)
            .iter()
            .filter_map(|child| self.owner(child))
            .map(|element| element.id().to_string())
            .collect()
    }

    fn owner(&self, child: &D::Node) -> Option<&OverlayElement<D::Node>> {
        let id = self.dom.attribute(child, NODE_ID_ATTRIBUTE)?;
        self.elements.get(&id)
    }

    /// Places a detached `node` before the first sibling that sorts after
    /// `order`: a strictly greater order, or no order at all. Unordered nodes
    /// and nodes without such a sibling go last.
    fn insert_ordered(&self, node: &D::Node, order: Option<f64>) {
        let Some(order) = order else {
            self.dom.append_child(&self.container, node);
            return;
        };
        let reference = self
            .dom
            .children(&self.container)
            .into_iter()
            .find(|child| match self.owner(child) {
                Some(element) => element.order().is_none_or(|other| other > order),
                None => false,
            });
        match reference {
            Some(reference) => self.dom.insert_before(&self.container, node, &reference),
            None => self.dom.append_child(&self.container, node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::memory::{MemoryDom, NodeId};
    use crate::host::Point;
    use crate::host::memory::MemoryGraph;
    use crate::template::Template;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn registry() -> OverlayRegistry<MemoryDom> {
        let dom = MemoryDom::new();
        let host = dom.create_element("div");
        OverlayRegistry::mount(dom, &host, &ContainerOptions::default())
    }

    fn id_config() -> LabelConfig {
        LabelConfig::new("node").with_template(Template::pattern("<div>{id}</div>"))
    }

    fn payload(id: &str, order: Option<f64>) -> Payload {
        let data = match order {
            Some(order) => json!({"id": id, "order": order}),
            None => json!({"id": id}),
        };
        Payload::new(data, Some(Geometry { x: 0.0, y: 0.0, w: 10.0, h: 10.0 }))
    }

    fn texts(registry: &OverlayRegistry<MemoryDom>) -> Vec<String> {
        let dom = registry.dom();
        dom.children(registry.container())
            .iter()
            .map(|child| dom.text_content(child))
            .collect()
    }

    fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for idx in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(idx);
            for mut tail in permutations(&rest) {
                tail.insert(0, head.clone());
                out.push(tail);
            }
        }
        out
    }

    const SAMPLE: [(&str, Option<f64>); 4] = [
        ("a", Some(3.0)),
        ("b", Some(1.0)),
        ("c", Some(2.0)),
        ("d", None),
    ];

    #[test]
    fn arrival_sequence_from_the_docs() {
        let sink = MemoryGraph::<NodeId>::new();
        let mut registry = registry();
        for (id, order) in SAMPLE {
            registry.upsert(&sink, id, &id_config(), payload(id, order));
        }
        assert_eq!(texts(&registry), vec!["b", "c", "a", "d"]);
        assert_eq!(registry.ids(), vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn any_arrival_sequence_sorts_the_same() {
        let sink = MemoryGraph::<NodeId>::new();
        for sequence in permutations(&SAMPLE) {
            let mut registry = registry();
            for (id, order) in &sequence {
                registry.upsert(&sink, id, &id_config(), payload(id, *order));
            }
            assert_eq!(registry.ids(), vec!["b", "c", "a", "d"], "arrival {sequence:?}");
        }
    }

    #[test]
    fn order_change_moves_overlay() {
        let sink = MemoryGraph::<NodeId>::new();
        let mut registry = registry();
        for (id, order) in SAMPLE {
            registry.upsert(&sink, id, &id_config(), payload(id, order));
        }
        registry.upsert(&sink, "a", &id_config(), payload("a", Some(0.0)));
        assert_eq!(registry.ids(), vec!["a", "b", "c", "d"]);

        registry.upsert(&sink, "c", &id_config(), payload("c", Some(1.5)));
        assert_eq!(registry.ids(), vec!["a", "b", "c", "d"]);

        registry.upsert(&sink, "b", &id_config(), payload("b", None));
        assert_eq!(registry.ids(), vec!["a", "c", "d", "b"]);

        registry.upsert(&sink, "d", &id_config(), payload("d", Some(10.0)));
        assert_eq!(registry.ids(), vec!["a", "c", "d", "b"]);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn equal_orders_keep_insertion_sequence() {
        let sink = MemoryGraph::<NodeId>::new();
        let mut registry = registry();
        for id in ["p", "q", "r"] {
            registry.upsert(&sink, id, &id_config(), payload(id, Some(1.0)));
        }
        registry.upsert(&sink, "q", &id_config(), payload("q", Some(1.0)));
        registry.upsert(&sink, "p", &id_config(), payload("p", Some(1.0)));
        assert_eq!(registry.ids(), vec!["p", "q", "r"]);

        registry.upsert(&sink, "s", &id_config(), payload("s", Some(1.0)));
        registry.upsert(&sink, "t", &id_config(), payload("t", Some(0.5)));
        assert_eq!(registry.ids(), vec!["t", "p", "q", "r", "s"]);
    }

    #[test]
    fn unordered_overlays_yield_to_ordered_ones() {
        let sink = MemoryGraph::<NodeId>::new();
        let mut registry = registry();
        registry.upsert(&sink, "x", &id_config(), payload("x", None));
        registry.upsert(&sink, "y", &id_config(), payload("y", None));
        registry.upsert(&sink, "z", &id_config(), payload("z", Some(7.0)));
        assert_eq!(registry.ids(), vec!["z", "x", "y"]);
    }

    #[test]
    fn removal_is_idempotent() {
        let sink = MemoryGraph::<NodeId>::new();
        let mut registry = registry();
        assert!(!registry.remove("ghost"));
        registry.upsert(&sink, "a", &id_config(), payload("a", Some(1.0)));
        registry.upsert(&sink, "b", &id_config(), payload("b", None));
        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));
        assert_eq!(registry.ids(), vec!["b"]);
        assert!(!registry.contains("a"));
        assert!(!registry.reposition(&sink, "a", Geometry::default()));
    }

    #[test]
    fn creation_emits_update_then_created() {
        let sink = MemoryGraph::<NodeId>::new();
        let mut registry = registry();
        registry.upsert(&sink, "a", &id_config(), payload("a", Some(1.0)));
        registry.upsert(&sink, "a", &id_config(), payload("a", Some(1.0)));

        let emitted = sink.take_labels();
        let flags: Vec<bool> = emitted.iter().map(|label| label.is_update).collect();
        assert_eq!(flags, vec![true, false, true]);
        assert_eq!(emitted[1].data["order"], json!(1.0));
        assert_eq!(&emitted[1].node, registry.get("a").unwrap().node());
    }

    #[test]
    fn update_always_reapplies_position() {
        let sink = MemoryGraph::<NodeId>::new();
        let mut registry = registry();
        registry.upsert(&sink, "a", &id_config(), payload("a", None));
        sink.take_labels();
        let writes = registry.dom().style_writes();
        registry.upsert(&sink, "a", &id_config(), payload("a", None));
        assert_eq!(registry.dom().style_writes(), writes);
        assert_eq!(sink.take_labels().len(), 1);
    }

    #[test]
    fn viewport_sync_targets_container_only() {
        let sink = MemoryGraph::<NodeId>::new();
        let mut registry = registry();
        registry.upsert(&sink, "a", &id_config(), payload("a", None));
        let overlay = *registry.get("a").unwrap().node();
        let before = registry.dom().style(&overlay, "transform");

        registry.sync_viewport(Viewport {
            pan: Point { x: 10.0, y: 20.0 },
            zoom: 2.0,
        });
        let dom = registry.dom();
        assert_eq!(
            dom.style(registry.container(), "transform").as_deref(),
            Some("translate(10px,20px) scale(2)")
        );
        assert_eq!(
            dom.style(registry.container(), "transform-origin").as_deref(),
            Some("top left")
        );
        assert_eq!(dom.style(&overlay, "transform"), before);
    }

    #[test]
    fn mount_places_container_beside_canvas() {
        let dom = MemoryDom::new();
        let host = dom.create_element("div");
        let wrapper = dom.create_element("div");
        let canvas = dom.create_element("canvas");
        dom.append_child(&host, &wrapper);
        dom.append_child(&wrapper, &canvas);

        let first = OverlayRegistry::mount(dom.clone(), &host, &ContainerOptions::default());
        assert_eq!(dom.parent(first.container()), Some(wrapper));
        assert_eq!(dom.style(first.container(), "pointer-events").as_deref(), Some("none"));
        assert_eq!(dom.style(first.container(), "z-index").as_deref(), Some("10"));

        let options = ContainerOptions {
            enable_pointer_events: true,
        };
        let second = OverlayRegistry::mount(dom.clone(), &host, &options);
        assert_eq!(dom.children(&wrapper), vec![canvas, *second.container()]);
        assert_eq!(dom.parent(first.container()), None);
        assert_eq!(dom.style(second.container(), "pointer-events"), None);
    }

    #[test]
    fn churn_does_not_grow_the_document() {
        let sink = MemoryGraph::<NodeId>::new();
        let mut registry = registry();
        registry.upsert(&sink, "a", &id_config(), payload("a", None));
        let settled = registry.dom().live_nodes();

        for n in 0..1000 {
            let order = Some(f64::from(n % 7));
            registry.upsert(&sink, "a", &id_config(), payload("a", order));
        }
        for _ in 0..1000 {
            registry.upsert(&sink, "b", &id_config(), payload("b", None));
            assert!(registry.remove("b"));
        }
        assert_eq!(registry.dom().live_nodes(), settled);
        assert_eq!(texts(&registry), vec!["a"]);
    }

    #[test]
    fn mount_without_canvas_uses_host_container() {
        let dom = MemoryDom::new();
        let host = dom.create_element("div");
        let registry = OverlayRegistry::mount(dom.clone(), &host, &ContainerOptions::default());
        assert_eq!(dom.children(&host), vec![*registry.container()]);
        assert!(registry.is_empty());
    }
}
