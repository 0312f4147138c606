use crate::error::Result;
use crate::template::Template;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

pub const DEFAULT_QUERY: &str = "node";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HAlign {
    Left,
    #[default]
    Center,
    Right,
}

impl HAlign {
    pub fn factor(self) -> f64 {
        match self {
            Self::Left => -0.5,
            Self::Center => 0.0,
            Self::Right => 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VAlign {
    Top,
    #[default]
    Center,
    Bottom,
}

impl VAlign {
    pub fn factor(self) -> f64 {
        match self {
            Self::Top => -0.5,
            Self::Center => 0.0,
            Self::Bottom => 0.5,
        }
    }
}

/// One label registration: which nodes it targets and how their overlays look.
#[derive(Debug, Clone)]
pub struct LabelConfig {
    pub query: String,
    /// Anchor on the node the overlay is pinned to.
    pub halign: HAlign,
    pub valign: VAlign,
    /// Anchor on the overlay box that lands on the node anchor.
    pub halign_box: HAlign,
    pub valign_box: VAlign,
    pub css_class: Option<String>,
    pub template: Template,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            query: DEFAULT_QUERY.to_string(),
            halign: HAlign::default(),
            valign: VAlign::default(),
            halign_box: HAlign::default(),
            valign_box: VAlign::default(),
            css_class: None,
            template: Template::default(),
        }
    }
}

impl LabelConfig {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_template(mut self, template: Template) -> Self {
        self.template = template;
        self
    }

    pub fn with_anchor(mut self, halign: HAlign, valign: VAlign) -> Self {
        self.halign = halign;
        self.valign = valign;
        self
    }

    pub fn with_box_anchor(mut self, halign: HAlign, valign: VAlign) -> Self {
        self.halign_box = halign;
        self.valign_box = valign;
        self
    }

    pub fn with_css_class(mut self, class: impl Into<String>) -> Self {
        self.css_class = Some(class.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerOptions {
    /// When false the container is transparent to pointer events so the
    /// canvas underneath keeps receiving them.
    pub enable_pointer_events: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OverlayConfig {
    pub labels: Vec<LabelConfig>,
    pub container: ContainerOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabelConfigFile {
    query: Option<String>,
    halign: Option<HAlign>,
    valign: Option<VAlign>,
    halign_box: Option<HAlign>,
    valign_box: Option<VAlign>,
    css_class: Option<String>,
    tpl: Option<String>,
}

impl LabelConfigFile {
    fn into_config(self) -> LabelConfig {
        let mut config = LabelConfig::default();
        if let Some(query) = self.query {
            config.query = query;
        }
        if let Some(v) = self.halign {
            config.halign = v;
        }
        if let Some(v) = self.valign {
            config.valign = v;
        }
        if let Some(v) = self.halign_box {
            config.halign_box = v;
        }
        if let Some(v) = self.valign_box {
            config.valign_box = v;
        }
        config.css_class = self.css_class.filter(|class| !class.is_empty());
        if let Some(tpl) = self.tpl {
            config.template = Template::pattern(tpl);
        }
        config
    }
}

/// Reads a label list from an arbitrary JSON value. Anything that is not an
/// array yields no configurations; unreadable entries are skipped.
pub fn labels_from_value(value: &Value) -> Vec<LabelConfig> {
    let Some(entries) = value.as_array() else {
        if !value.is_null() {
            tracing::warn!("label configuration is not an array; overlays disabled");
        }
        return Vec::new();
    };
    entries
        .iter()
        .enumerate()
        .filter_map(|(idx, entry)| {
            match serde_json::from_value::<LabelConfigFile>(entry.clone()) {
                Ok(file) => Some(file.into_config()),
                Err(err) => {
                    tracing::warn!(index = idx, error = %err, "skipping unreadable label configuration");
                    None
                }
            }
        })
        .collect()
}

/// Parses a JSON or JSON5 document: either a bare label array or
/// `{ "labels": [...], "enablePointerEvents": bool }`.
pub fn parse_config(contents: &str) -> Result<OverlayConfig> {
    let parsed: Value = json5::from_str(contents)?;
    let mut config = OverlayConfig::default();
    match &parsed {
        Value::Object(map) => {
            config.labels = labels_from_value(map.get("labels").unwrap_or(&Value::Null));
            if let Some(flag) = map.get("enablePointerEvents").and_then(Value::as_bool) {
                config.container.enable_pointer_events = flag;
            }
        }
        other => config.labels = labels_from_value(other),
    }
    Ok(config)
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<OverlayConfig> {
    let Some(path) = path else {
        return Ok(OverlayConfig::default());
    };
    let contents = std::fs::read_to_string(path)?;
    Ok(parse_config(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn label_file_fills_defaults() {
        let labels = labels_from_value(&json!([
            {"query": "node.hub", "halign": "left", "valignBox": "bottom", "cssClass": "hub", "tpl": "<b>{id}</b>"},
            {}
        ]));
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].query, "node.hub");
        assert_eq!(labels[0].halign, HAlign::Left);
        assert_eq!(labels[0].valign, VAlign::Center);
        assert_eq!(labels[0].valign_box, VAlign::Bottom);
        assert_eq!(labels[0].css_class.as_deref(), Some("hub"));
        assert_eq!(labels[0].template.render(&json!({"id": "h"})), "<b>h</b>");
        assert_eq!(labels[1].query, DEFAULT_QUERY);
        assert_eq!(labels[1].template.render(&json!({})), "");
    }

    #[test]
    fn non_array_labels_are_inert() {
        assert!(labels_from_value(&json!({"query": "node"})).is_empty());
        assert!(labels_from_value(&json!("node")).is_empty());
        assert!(labels_from_value(&Value::Null).is_empty());
    }

    #[test]
    fn bad_entries_are_skipped() {
        let labels = labels_from_value(&json!([{"halign": "middle"}, {"query": "#a"}]));
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].query, "#a");
    }

    #[test]
    fn parses_json5_document() {
        let config = parse_config(
            r#"{
                // trailing commas and comments are fine
                labels: [{ query: "node", tpl: "<div>{id}</div>" },],
                enablePointerEvents: true,
            }"#,
        )
        .unwrap();
        assert_eq!(config.labels.len(), 1);
        assert!(config.container.enable_pointer_events);

        let bare = parse_config(r#"[{"query": "node"}]"#).unwrap();
        assert_eq!(bare.labels.len(), 1);
        assert!(!bare.container.enable_pointer_events);
    }

    #[test]
    fn load_config_without_path_is_default() {
        let config = load_config(None).unwrap();
        assert!(config.labels.is_empty());
        assert_eq!(config.container, ContainerOptions::default());
    }

    #[test]
    fn alignment_factors() {
        assert_eq!(HAlign::Left.factor(), -0.5);
        assert_eq!(HAlign::Right.factor(), 0.5);
        assert_eq!(VAlign::Top.factor(), -0.5);
        assert_eq!(VAlign::Center.factor(), 0.0);
    }
}
