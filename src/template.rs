use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{|\}\}|\{\s*([A-Za-z_][\w.-]*)\s*\}").unwrap());

/// Maps node data to the markup placed inside an overlay.
#[derive(Clone, Default)]
pub enum Template {
    #[default]
    Empty,
    /// `{field}` placeholders filled from node data, values HTML-escaped.
    /// Dotted paths reach into nested objects; `{{` and `}}` are literal braces.
    Pattern(String),
    Custom(Rc<dyn Fn(&Value) -> String>),
}

impl Template {
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::Pattern(pattern.into())
    }

    pub fn custom<F>(render: F) -> Self
    where
        F: Fn(&Value) -> String + 'static,
    {
        Self::Custom(Rc::new(render))
    }

    pub fn render(&self, data: &Value) -> String {
        match self {
            Template::Empty => String::new(),
            Template::Pattern(pattern) => interpolate(pattern, data),
            Template::Custom(render) => render(data),
        }
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Template::Empty => f.write_str("Template::Empty"),
            Template::Pattern(pattern) => f.debug_tuple("Template::Pattern").field(pattern).finish(),
            Template::Custom(_) => f.write_str("Template::Custom(..)"),
        }
    }
}

fn interpolate(pattern: &str, data: &Value) -> String {
    PLACEHOLDER_RE
        .replace_all(pattern, |caps: &Captures| match caps.get(1) {
            Some(path) => lookup(data, path.as_str())
                .map(|value| escape_html(&display_value(value)))
                .unwrap_or_default(),
            None if &caps[0] == "{{" => "{".to_string(),
            None => "}".to_string(),
        })
        .into_owned()
}

fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(data, |current, key| current.get(key))
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
