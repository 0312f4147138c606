//! Bindings to a cytoscape core and its element collections.

use js_sys::{Function, JSON, Object, Reflect};
use node_html_label::host::{Point, Task};
use node_html_label::{
    EventSource, Geometry, GraphEvent, GraphEventKind, GraphHost, LabelSink, LabelUpdate, Viewport,
    host::LABEL_UPDATED_EVENT,
};
use serde_json::Value;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::Element;

#[wasm_bindgen]
extern "C" {
    #[derive(Debug, Clone)]
    pub type Core;

    #[wasm_bindgen(method)]
    pub fn container(this: &Core) -> Option<Element>;

    #[wasm_bindgen(method)]
    fn nodes(this: &Core) -> Collection;

    #[wasm_bindgen(method, js_name = getElementById)]
    fn get_element_by_id(this: &Core, id: &str) -> Collection;

    #[wasm_bindgen(method)]
    fn pan(this: &Core) -> JsValue;

    #[wasm_bindgen(method)]
    fn zoom(this: &Core) -> f64;

    #[wasm_bindgen(method)]
    fn on(this: &Core, events: &str, handler: &Function);

    #[wasm_bindgen(method)]
    fn one(this: &Core, events: &str, handler: &Function);

    #[wasm_bindgen(method)]
    fn emit(this: &Core, events: &str, extra: &JsValue);

    #[derive(Debug, Clone)]
    type Collection;

    #[wasm_bindgen(method, getter)]
    fn length(this: &Collection) -> u32;

    #[wasm_bindgen(method)]
    fn eq(this: &Collection, index: u32) -> Collection;

    #[wasm_bindgen(method)]
    fn id(this: &Collection) -> String;

    #[wasm_bindgen(method, js_name = "is")]
    fn matches(this: &Collection, selector: &str) -> bool;

    #[wasm_bindgen(method)]
    fn data(this: &Collection) -> JsValue;

    #[wasm_bindgen(method, js_name = position)]
    fn position_of(this: &Collection, dimension: &str) -> f64;

    #[wasm_bindgen(method)]
    fn width(this: &Collection) -> f64;

    #[wasm_bindgen(method)]
    fn height(this: &Collection) -> f64;

    #[wasm_bindgen(method)]
    fn removed(this: &Collection) -> bool;
}

pub(crate) fn to_json(value: &JsValue) -> Value {
    JSON::stringify(value)
        .ok()
        .and_then(|text| text.as_string())
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or(Value::Null)
}

pub(crate) fn to_js(value: &Value) -> JsValue {
    JSON::parse(&value.to_string()).unwrap_or(JsValue::NULL)
}

fn number(object: &JsValue, key: &str) -> f64 {
    Reflect::get(object, &JsValue::from_str(key))
        .ok()
        .and_then(|value| value.as_f64())
        .unwrap_or_default()
}

/// Reads a cytoscape event object. Events on elements carry the element id.
fn graph_event(event: &JsValue) -> Option<GraphEvent> {
    let name = Reflect::get(event, &JsValue::from_str("type")).ok()?.as_string()?;
    let kind = GraphEventKind::from_name(&name)?;
    let target = Reflect::get(event, &JsValue::from_str("target")).ok()?;
    let is_element = Reflect::has(&target, &JsValue::from_str("isNode")).unwrap_or(false);
    if is_element {
        let element: Collection = target.unchecked_into();
        Some(GraphEvent::node(kind, element.id()))
    } else {
        Some(GraphEvent::graph(kind))
    }
}

/// A cytoscape core seen through the overlay host traits.
#[derive(Debug, Clone)]
pub struct CyHost {
    core: Core,
}

impl CyHost {
    pub fn new(core: Core) -> Self {
        Self { core }
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    fn element(&self, id: &str) -> Option<Collection> {
        let found = self.core.get_element_by_id(id);
        (found.length() > 0).then_some(found)
    }

    fn subscribe(&self, names: &str, once: bool, mut handler: node_html_label::host::Handler<Element>) {
        let host = self.clone();
        let callback = Closure::<dyn FnMut(JsValue)>::new(move |event: JsValue| {
            if let Some(event) = graph_event(&event) {
                handler(&host, &event);
            }
        });
        let function: &Function = callback.as_ref().unchecked_ref();
        if once {
            self.core.one(names, function);
        } else {
            self.core.on(names, function);
        }
        // cytoscape keeps the listener for the life of the core
        callback.forget();
    }
}

impl LabelSink<Element> for CyHost {
    fn emit(&self, update: LabelUpdate<'_, Element>) {
        let payload = Object::new();
        let fields = [
            ("id", JsValue::from_str(update.id)),
            ("isUpdate", JsValue::from_bool(update.is_update)),
            ("data", to_js(update.data)),
            (
                "position",
                update
                    .geometry
                    .and_then(|geometry| serde_json::to_value(geometry).ok())
                    .map_or(JsValue::UNDEFINED, |value| to_js(&value)),
            ),
            ("node", update.node.clone().into()),
        ];
        for (key, value) in fields {
            let _ = Reflect::set(&payload, &JsValue::from_str(key), &value);
        }
        self.core.emit(LABEL_UPDATED_EVENT, &payload);
    }
}

impl GraphHost<Element> for CyHost {
    fn node_ids(&self) -> Vec<String> {
        let nodes = self.core.nodes();
        (0..nodes.length()).map(|idx| nodes.eq(idx).id()).collect()
    }

    fn matches(&self, id: &str, query: &str) -> bool {
        self.element(id).is_some_and(|element| element.matches(query))
    }

    fn data(&self, id: &str) -> Option<Value> {
        self.element(id).map(|element| to_json(&element.data()))
    }

    fn geometry(&self, id: &str) -> Option<Geometry> {
        self.element(id).map(|element| Geometry {
            x: element.position_of("x"),
            y: element.position_of("y"),
            w: element.width(),
            h: element.height(),
        })
    }

    fn removed(&self, id: &str) -> bool {
        self.element(id).is_none_or(|element| element.removed())
    }

    fn viewport(&self) -> Viewport {
        let pan = self.core.pan();
        Viewport {
            pan: Point {
                x: number(&pan, "x"),
                y: number(&pan, "y"),
            },
            zoom: self.core.zoom(),
        }
    }

    fn defer(&self, task: Task<Element>) {
        let host = self.clone();
        let callback = Closure::once_into_js(move || task(&host));
        let scheduled = web_sys::window().map(|window| {
            window.set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), 0)
        });
        if !matches!(scheduled, Some(Ok(_))) {
            tracing::warn!("setTimeout unavailable, deferred overlay update dropped");
        }
    }
}

impl EventSource<Element> for CyHost {
    fn on(&mut self, kinds: &[GraphEventKind], handler: node_html_label::host::Handler<Element>) {
        let names: Vec<&str> = kinds.iter().map(|kind| kind.name()).collect();
        self.subscribe(&names.join(" "), false, handler);
    }

    fn one(&mut self, kind: GraphEventKind, handler: node_html_label::host::Handler<Element>) {
        self.subscribe(kind.name(), true, handler);
    }
}
