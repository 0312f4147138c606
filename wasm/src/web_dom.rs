use node_html_label::Dom;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, DomParser, Element, HtmlElement, SupportedType};

/// [`Dom`] over the live browser document.
#[derive(Debug, Clone)]
pub struct WebDom {
    document: Document,
    /// Detached `div` handed out if the document refuses a tag name.
    fallback: Element,
}

impl WebDom {
    pub fn new(document: Document) -> Result<Self, JsValue> {
        let fallback = document.create_element("div")?;
        Ok(Self { document, fallback })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

fn report(op: &str, result: Result<impl Sized, JsValue>) {
    if let Err(err) = result {
        tracing::warn!(op, error = ?err, "dom call failed");
    }
}

fn elements(collection: &web_sys::HtmlCollection) -> Vec<Element> {
    (0..collection.length())
        .filter_map(|idx| collection.item(idx))
        .collect()
}

impl Dom for WebDom {
    type Node = Element;

    fn create_element(&self, tag: &str) -> Element {
        match self.document.create_element(tag) {
            Ok(element) => element,
            Err(err) => {
                tracing::error!(tag, error = ?err, "createElement failed");
                self.fallback.clone()
            }
        }
    }

    fn append_child(&self, parent: &Element, child: &Element) {
        report("appendChild", parent.append_child(child));
    }

    fn insert_before(&self, parent: &Element, child: &Element, reference: &Element) {
        report("insertBefore", parent.insert_before(child, Some(reference)));
    }

    fn remove_child(&self, parent: &Element, child: &Element) {
        if child.parent_element().as_ref() == Some(parent) {
            report("removeChild", parent.remove_child(child));
        }
    }

    fn clear_children(&self, node: &Element) {
        node.set_inner_html("");
    }

    fn children(&self, parent: &Element) -> Vec<Element> {
        elements(&parent.children())
    }

    fn parent(&self, node: &Element) -> Option<Element> {
        node.parent_element()
    }

    fn query_selector(&self, root: &Element, selector: &str) -> Option<Element> {
        root.query_selector(selector).ok().flatten()
    }

    fn set_style(&self, node: &Element, property: &str, value: &str) {
        if let Some(html) = node.dyn_ref::<HtmlElement>() {
            report("style.setProperty", html.style().set_property(property, value));
        }
    }

    fn style(&self, node: &Element, property: &str) -> Option<String> {
        let html = node.dyn_ref::<HtmlElement>()?;
        html.style()
            .get_property_value(property)
            .ok()
            .filter(|value| !value.is_empty())
    }

    fn add_class(&self, node: &Element, class: &str) {
        report("classList.add", node.class_list().add_1(class));
    }

    fn set_attribute(&self, node: &Element, name: &str, value: &str) {
        report("setAttribute", node.set_attribute(name, value));
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn parse_fragment(&self, markup: &str) -> Vec<Element> {
        let parsed = DomParser::new()
            .and_then(|parser| parser.parse_from_string(markup, SupportedType::TextHtml));
        let body = match parsed {
            Ok(doc) => doc.body(),
            Err(err) => {
                tracing::warn!(error = ?err, "markup could not be parsed");
                None
            }
        };
        let Some(body) = body else {
            return Vec::new();
        };
        elements(&body.children())
            .into_iter()
            .filter_map(|child| self.document.adopt_node(&child).ok())
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }

    fn text_content(&self, node: &Element) -> String {
        node.text_content().unwrap_or_default()
    }
}
