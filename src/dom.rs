//! The slice of the DOM the overlay layer touches.
//!
//! Implementations hand out cheap node handles; every method takes `&self`
//! because a document is a shared handle that many owners mutate through.

pub mod memory;

use std::fmt;

pub trait Dom {
    type Node: Clone + PartialEq + fmt::Debug;

    fn create_element(&self, tag: &str) -> Self::Node;

    /// Moves `child` to the end of `parent`, detaching it from its old parent.
    fn append_child(&self, parent: &Self::Node, child: &Self::Node);

    /// Moves `child` directly before `reference`, which must be a child of `parent`.
    fn insert_before(&self, parent: &Self::Node, child: &Self::Node, reference: &Self::Node);

    /// No-op when `child` is not attached to `parent`.
    fn remove_child(&self, parent: &Self::Node, child: &Self::Node);

    /// Removes every child node, text included. The removed nodes are
    /// released.
    fn clear_children(&self, node: &Self::Node);

    /// Detaches `node` and gives up it and its subtree for good. Handles to
    /// released nodes must not be used again. Documents with their own
    /// garbage collection can ignore this.
    fn release(&self, _node: &Self::Node) {}

    /// Element children in document order.
    fn children(&self, parent: &Self::Node) -> Vec<Self::Node>;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// First descendant element of `root` matching `selector`.
    fn query_selector(&self, root: &Self::Node, selector: &str) -> Option<Self::Node>;

    fn set_style(&self, node: &Self::Node, property: &str, value: &str);

    fn style(&self, node: &Self::Node, property: &str) -> Option<String>;

    fn add_class(&self, node: &Self::Node, class: &str);

    fn set_attribute(&self, node: &Self::Node, name: &str, value: &str);

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// Parses markup into detached top-level elements, in source order.
    /// Markup that cannot be parsed yields no elements.
    fn parse_fragment(&self, markup: &str) -> Vec<Self::Node>;

    fn text_content(&self, node: &Self::Node) -> String;
}
