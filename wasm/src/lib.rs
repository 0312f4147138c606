mod cytoscape;
mod web_dom;

pub use cytoscape::{Core, CyHost};
pub use web_dom::WebDom;

use js_sys::{Array, Function, Reflect};
use node_html_label::{ContainerOptions, LabelConfig, Template, labels_from_value};
use serde_json::Value;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// Reads container options; anything other than `enablePointerEvents: true`
/// keeps pointer events disabled.
fn container_options(options: &Value) -> ContainerOptions {
    ContainerOptions {
        enable_pointer_events: options
            .get("enablePointerEvents")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

/// Builds one label configuration from its serialisable fields.
fn label_config(fields: Value) -> Option<LabelConfig> {
    labels_from_value(&Value::Array(vec![fields])).into_iter().next()
}

fn js_template(render: Function) -> Template {
    Template::custom(move |data| {
        let argument = cytoscape::to_js(data);
        match render.call1(&JsValue::NULL, &argument) {
            Ok(markup) => markup.as_string().unwrap_or_default(),
            Err(err) => {
                tracing::warn!(error = ?err, "label template threw");
                String::new()
            }
        }
    })
}

fn label_configs(params: &JsValue) -> Vec<LabelConfig> {
    let Some(entries) = params.dyn_ref::<Array>() else {
        tracing::warn!("nodeHtmlLabel params is not an array; overlays disabled");
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let mut config = label_config(cytoscape::to_json(&entry))?;
            let tpl = Reflect::get(&entry, &JsValue::from_str("tpl")).ok();
            if let Some(render) = tpl.and_then(|tpl| tpl.dyn_into::<Function>().ok()) {
                config.template = js_template(render);
            }
            Some(config)
        })
        .collect()
}

/// Attaches HTML labels to the nodes of `cy`. `params` is an array of
/// `{ query, halign, valign, halignBox, valignBox, cssClass, tpl }` where
/// `tpl` is a function from node data to markup.
#[wasm_bindgen(js_name = nodeHtmlLabel)]
pub fn register(cy: Core, params: JsValue, options: JsValue) -> Result<Core, JsValue> {
    let document = web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| JsValue::from_str("no document available"))?;
    let container = cy
        .container()
        .ok_or_else(|| JsValue::from_str("cytoscape core has no container"))?;
    let dom = WebDom::new(document)?;
    let configs = label_configs(&params);
    let options = container_options(&cytoscape::to_json(&options));

    let mut host = CyHost::new(cy.clone());
    node_html_label::node_html_label(&mut host, dom, &container, configs, &options);
    Ok(cy)
}
