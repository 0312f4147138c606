//! Arena-backed DOM used by tests, benches and headless hosts.
//!
//! Slots of released nodes are reused. Every handle carries the generation of
//! its slot, so a handle kept past release reads as a detached empty node and
//! writes through it are ignored.

use super::Dom;
use crate::selector::{Selectable, Selector};
use html5ever::tendril::TendrilSink;
use html5ever::{ParseOpts, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
enum NodeKind {
    Element(String),
    Text(String),
}

#[derive(Debug)]
struct Record {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
}

impl Record {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            attributes: BTreeMap::new(),
            style: BTreeMap::new(),
        }
    }

    fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element(_))
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    record: Option<Record>,
}

#[derive(Debug, Default)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<usize>,
    style_writes: usize,
}

impl Arena {
    fn push(&mut self, record: Record) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.record = Some(record);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            record: Some(record),
        });
        NodeId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    fn get(&self, id: NodeId) -> Option<&Record> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.record.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Record> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.record.as_mut())
    }

    fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    fn detach(&mut self, child: NodeId) {
        let parent = self.get_mut(child).and_then(|record| record.parent.take());
        if let Some(parent) = parent.and_then(|parent| self.get_mut(parent)) {
            parent.children.retain(|id| *id != child);
        }
    }

    /// Puts `child` into `parent` at `index` (clamped), moving it from any
    /// previous parent. Refused when either handle is stale or `child` is an
    /// ancestor of `parent`.
    fn attach(&mut self, parent: NodeId, child: NodeId, index: impl FnOnce(&[NodeId]) -> usize) {
        if self.get(child).is_none() || self.get(parent).is_none() || self.contains(child, parent) {
            return;
        }
        self.detach(child);
        if let Some(record) = self.get_mut(parent) {
            let at = index(&record.children).min(record.children.len());
            record.children.insert(at, child);
        }
        if let Some(record) = self.get_mut(child) {
            record.parent = Some(parent);
        }
    }

    /// Whether `node` is `ancestor` or lies below it.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.get(id).and_then(|record| record.parent);
        }
        false
    }

    fn release(&mut self, id: NodeId) {
        self.detach(id);
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let Some(slot) = self
                .slots
                .get_mut(id.index)
                .filter(|slot| slot.generation == id.generation)
            else {
                continue;
            };
            if let Some(record) = slot.record.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
                pending.extend(record.children);
            }
        }
    }

    fn import(&mut self, source: &Handle) -> Option<NodeId> {
        let record = match &source.data {
            NodeData::Element { name, attrs, .. } => {
                let mut record = Record::new(NodeKind::Element(name.local.to_string()));
                for attr in attrs.borrow().iter() {
                    record
                        .attributes
                        .insert(attr.name.local.to_string(), attr.value.to_string());
                }
                record
            }
            NodeData::Text { contents } => Record::new(NodeKind::Text(contents.borrow().to_string())),
            _ => return None,
        };
        let id = self.push(record);
        for child in source.children.borrow().iter() {
            if let Some(child_id) = self.import(child) {
                if let Some(record) = self.get_mut(child_id) {
                    record.parent = Some(id);
                }
                if let Some(record) = self.get_mut(id) {
                    record.children.push(child_id);
                }
            }
        }
        Some(id)
    }

    fn text(&self, id: NodeId, out: &mut String) {
        let Some(record) = self.get(id) else {
            return;
        };
        match &record.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(_) => {
                for child in &record.children {
                    self.text(*child, out);
                }
            }
        }
    }

    fn html(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get(id) else {
            return;
        };
        let tag = match &node.kind {
            NodeKind::Text(text) => {
                out.push_str(&crate::template::escape_html(text));
                return;
            }
            NodeKind::Element(tag) => tag,
        };
        out.push('<');
        out.push_str(tag);
        for (name, value) in &node.attributes {
            out.push_str(&format!(" {name}=\"{}\"", crate::template::escape_html(value)));
        }
        if !node.style.is_empty() {
            let style = node
                .style
                .iter()
                .map(|(prop, value)| format!("{prop}: {value}"))
                .collect::<Vec<_>>()
                .join("; ");
            out.push_str(&format!(" style=\"{style}\""));
        }
        out.push('>');
        for child in &node.children {
            self.html(*child, out);
        }
        out.push_str(&format!("</{tag}>"));
    }
}

fn child_element(parent: &Handle, tag: &str) -> Option<Handle> {
    parent
        .children
        .borrow()
        .iter()
        .find(|child| matches!(&child.data, NodeData::Element { name, .. } if &*name.local == tag))
        .cloned()
}

struct ElementView<'a> {
    tag: &'a str,
    record: &'a Record,
}

impl Selectable for ElementView<'_> {
    fn tag(&self) -> &str {
        self.tag
    }

    fn element_id(&self) -> Option<&str> {
        self.record.attributes.get("id").map(String::as_str)
    }

    fn has_class(&self, class: &str) -> bool {
        self.record
            .attributes
            .get("class")
            .is_some_and(|list| list.split_whitespace().any(|token| token == class))
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.record.attributes.get(name).cloned().map(Value::String)
    }
}

/// A shared in-memory document; clones refer to the same tree.
#[derive(Debug, Clone, Default)]
pub struct MemoryDom {
    arena: Rc<RefCell<Arena>>,
}

impl MemoryDom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set_style` calls made so far.
    pub fn style_writes(&self) -> usize {
        self.arena.borrow().style_writes
    }

    /// Nodes currently allocated, attached or not.
    pub fn live_nodes(&self) -> usize {
        self.arena.borrow().live()
    }

    pub fn tag_name(&self, node: &NodeId) -> Option<String> {
        match &self.arena.borrow().get(*node)?.kind {
            NodeKind::Element(tag) => Some(tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn outer_html(&self, node: &NodeId) -> String {
        let mut out = String::new();
        self.arena.borrow().html(*node, &mut out);
        out
    }
}

impl Dom for MemoryDom {
    type Node = NodeId;

    fn create_element(&self, tag: &str) -> NodeId {
        self.arena
            .borrow_mut()
            .push(Record::new(NodeKind::Element(tag.to_ascii_lowercase())))
    }

    fn append_child(&self, parent: &NodeId, child: &NodeId) {
        self.arena
            .borrow_mut()
            .attach(*parent, *child, |siblings| siblings.len());
    }

    fn insert_before(&self, parent: &NodeId, child: &NodeId, reference: &NodeId) {
        let reference = *reference;
        self.arena.borrow_mut().attach(*parent, *child, |siblings| {
            siblings
                .iter()
                .position(|id| *id == reference)
                .unwrap_or(siblings.len())
        });
    }

    fn remove_child(&self, parent: &NodeId, child: &NodeId) {
        let mut arena = self.arena.borrow_mut();
        if arena.get(*child).and_then(|record| record.parent) == Some(*parent) {
            arena.detach(*child);
        }
    }

    fn clear_children(&self, node: &NodeId) {
        let mut arena = self.arena.borrow_mut();
        let children = arena
            .get_mut(*node)
            .map(|record| std::mem::take(&mut record.children))
            .unwrap_or_default();
        for child in children {
            if let Some(record) = arena.get_mut(child) {
                record.parent = None;
            }
            arena.release(child);
        }
    }

    fn release(&self, node: &NodeId) {
        self.arena.borrow_mut().release(*node);
    }

    fn children(&self, parent: &NodeId) -> Vec<NodeId> {
        let arena = self.arena.borrow();
        let Some(record) = arena.get(*parent) else {
            return Vec::new();
        };
        record
            .children
            .iter()
            .copied()
            .filter(|id| arena.get(*id).is_some_and(Record::is_element))
            .collect()
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.arena.borrow().get(*node)?.parent
    }

    fn query_selector(&self, root: &NodeId, selector: &str) -> Option<NodeId> {
        let selector = match Selector::parse(selector) {
            Ok(selector) => selector,
            Err(err) => {
                tracing::warn!(error = %err, "query_selector ignored");
                return None;
            }
        };
        let arena = self.arena.borrow();
        let mut stack: Vec<NodeId> = arena.get(*root)?.children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let Some(record) = arena.get(id) else {
                continue;
            };
            if let NodeKind::Element(tag) = &record.kind {
                if selector.matches(&ElementView { tag, record }) {
                    return Some(id);
                }
                stack.extend(record.children.iter().rev().copied());
            }
        }
        None
    }

    fn set_style(&self, node: &NodeId, property: &str, value: &str) {
        let mut arena = self.arena.borrow_mut();
        arena.style_writes += 1;
        if let Some(record) = arena.get_mut(*node) {
            record.style.insert(property.to_string(), value.to_string());
        }
    }

    fn style(&self, node: &NodeId, property: &str) -> Option<String> {
        self.arena.borrow().get(*node)?.style.get(property).cloned()
    }

    fn add_class(&self, node: &NodeId, class: &str) {
        let mut arena = self.arena.borrow_mut();
        let Some(record) = arena.get_mut(*node) else {
            return;
        };
        let list = record.attributes.entry("class".to_string()).or_default();
        if !list.split_whitespace().any(|token| token == class) {
            if !list.is_empty() {
                list.push(' ');
            }
            list.push_str(class);
        }
    }

    fn set_attribute(&self, node: &NodeId, name: &str, value: &str) {
        if let Some(record) = self.arena.borrow_mut().get_mut(*node) {
            record.attributes.insert(name.to_string(), value.to_string());
        }
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.arena.borrow().get(*node)?.attributes.get(name).cloned()
    }

    /// Parses `markup` as the body of an HTML document, with the usual error
    /// recovery, and imports the body's element children.
    fn parse_fragment(&self, markup: &str) -> Vec<NodeId> {
        let parsed = parse_document(RcDom::default(), ParseOpts::default()).one(markup);
        let Some(body) = child_element(&parsed.document, "html").and_then(|html| child_element(&html, "body")) else {
            tracing::warn!("parsed markup has no body");
            return Vec::new();
        };
        let mut arena = self.arena.borrow_mut();
        body.children
            .borrow()
            .iter()
            .filter(|child| matches!(child.data, NodeData::Element { .. }))
            .filter_map(|child| arena.import(child))
            .collect()
    }

    fn text_content(&self, node: &NodeId) -> String {
        let mut out = String::new();
        self.arena.borrow().text(*node, &mut out);
        out
    }
}
