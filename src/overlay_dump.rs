use crate::dom::Dom;
use crate::registry::OverlayRegistry;
use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct OverlayDump {
    pub container_transform: Option<String>,
    pub pointer_events: Option<String>,
    pub overlays: Vec<OverlayEntryDump>,
}

#[derive(Debug, Serialize)]
pub struct OverlayEntryDump {
    pub id: String,
    pub order: Option<f64>,
    pub position: Option<[f64; 2]>,
    pub transform: Option<String>,
    pub class: Option<String>,
    pub text: String,
    pub data: Value,
}

impl OverlayDump {
    /// Snapshot of the registry in container order.
    pub fn from_registry<D: Dom>(registry: &OverlayRegistry<D>) -> Self {
        let dom = registry.dom();
        let overlays = registry
            .ids()
            .into_iter()
            .filter_map(|id| registry.get(&id))
            .map(|element| OverlayEntryDump {
                id: element.id().to_string(),
                order: element.order(),
                position: element.rendered_position().map(|(x, y)| [x, y]),
                transform: dom.style(element.node(), "transform"),
                class: dom.attribute(element.node(), "class"),
                text: dom.text_content(element.node()),
                data: element.data().clone(),
            })
            .collect();

        Self {
            container_transform: dom.style(registry.container(), "transform"),
            pointer_events: dom.style(registry.container(), "pointer-events"),
            overlays,
        }
    }
}

pub fn write_overlay_dump<D: Dom>(path: &Path, registry: &OverlayRegistry<D>) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let dump = OverlayDump::from_registry(registry);
    serde_json::to_writer_pretty(&mut writer, &dump)?;
    writer.flush()?;
    Ok(())
}
