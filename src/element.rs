use crate::config::LabelConfig;
use crate::dom::Dom;
use crate::host::{Geometry, LabelSink, LabelUpdate};
use crate::template::Template;
use serde_json::Value;

/// Attribute carrying the owning node id on every overlay element.
pub const NODE_ID_ATTRIBUTE: &str = "data-node-id";

/// Offsets derived from a [`LabelConfig`]: node anchor factors in
/// `{-0.5, 0, 0.5}` and box anchor percentages in `{-100, -50, 0}`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    pub node_x: f64,
    pub node_y: f64,
    pub box_x: f64,
    pub box_y: f64,
}

impl Alignment {
    pub fn from_config(config: &LabelConfig) -> Self {
        Self {
            node_x: config.halign.factor(),
            node_y: config.valign.factor(),
            box_x: 100.0 * (config.halign_box.factor() - 0.5),
            box_y: 100.0 * (config.valign_box.factor() - 0.5),
        }
    }
}

/// The HTML mirror of one graph node.
#[derive(Debug)]
pub struct OverlayElement<N> {
    id: String,
    node: N,
    template: Template,
    css_class: Option<String>,
    align: Alignment,
    position: Option<(f64, f64)>,
    data: Value,
}

impl<N> OverlayElement<N> {
    /// Takes ownership of `node`, applies base styles and the CSS class, then
    /// renders `data` and `position` when given.
    pub fn new<D, S>(
        dom: &D,
        sink: &S,
        id: &str,
        node: N,
        config: &LabelConfig,
        data: Option<Value>,
        position: Option<Geometry>,
    ) -> Self
    where
        D: Dom<Node = N>,
        S: LabelSink<N> + ?Sized,
    {
        let mut element = Self {
            id: id.to_string(),
            node,
            template: Template::Empty,
            css_class: None,
            align: Alignment::from_config(config),
            position: None,
            data: Value::Null,
        };
        element.apply_configuration(config);

        dom.set_style(&element.node, "position", "absolute");
        dom.set_attribute(&element.node, NODE_ID_ATTRIBUTE, id);
        if let Some(class) = element.css_class.as_deref().filter(|c| !c.is_empty()) {
            dom.add_class(&element.node, class);
        }

        if let Some(data) = data {
            element.apply_data(dom, data);
        }
        if let Some(position) = position {
            element.apply_position(dom, sink, position);
        }
        element
    }

    pub fn apply_configuration(&mut self, config: &LabelConfig) {
        self.align = Alignment::from_config(config);
        self.template = config.template.clone();
        self.css_class = config.css_class.clone();
    }

    /// Replaces the element's children with the rendered template.
    pub fn apply_data<D: Dom<Node = N>>(&mut self, dom: &D, data: Value) {
        self.data = data;
        dom.clear_children(&self.node);
        let markup = self.template.render(&self.data);
        let children = dom.parse_fragment(&markup);
        if children.is_empty() && !markup.trim().is_empty() {
            tracing::trace!(id = %self.id, "template produced no elements");
        }
        for child in &children {
            dom.append_child(&self.node, child);
        }
    }

    /// Moves the element to the anchored point of `geometry`. The transform is
    /// only rewritten when that point moved. Returns whether it did.
    pub fn apply_position<D, S>(&mut self, dom: &D, sink: &S, geometry: Geometry) -> bool
    where
        D: Dom<Node = N>,
        S: LabelSink<N> + ?Sized,
    {
        let x = geometry.x + self.align.node_x * geometry.w;
        let y = geometry.y + self.align.node_y * geometry.h;
        let changed = self.position != Some((x, y));
        if changed {
            self.position = Some((x, y));
            let transform = format!(
                "translate({}%,{}%) translate({x:.2}px,{y:.2}px)",
                self.align.box_x, self.align.box_y
            );
            dom.set_style(&self.node, "transform", &transform);
        }
        sink.emit(LabelUpdate {
            id: &self.id,
            is_update: true,
            geometry: Some(geometry),
            data: &self.data,
            node: &self.node,
        });
        changed
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Numeric `order` of the last applied data.
    pub fn order(&self) -> Option<f64> {
        order_of(&self.data)
    }

    pub fn rendered_position(&self) -> Option<(f64, f64)> {
        self.position
    }
}

pub(crate) fn order_of(data: &Value) -> Option<f64> {
    data.get("order").and_then(Value::as_f64)
}
