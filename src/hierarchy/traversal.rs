//! Structured traversal of a live element tree.

use super::{ElementType, Frame, HierarchyNode};

/// Attribute values read from one live element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSnapshot {
    pub element_type: ElementType,
    pub title: String,
    pub identifier: String,
    pub label: String,
    pub placeholder: Option<String>,
    pub value: Option<String>,
    pub is_enabled: bool,
    pub is_selected: bool,
    /// Whether a tap at the element's position would reach it. This is the
    /// element's interactive flag, emitted as `isHittable`.
    pub is_hittable: bool,
    pub frame: Frame,
}

impl ElementSnapshot {
    pub fn new(element_type: ElementType) -> Self {
        Self {
            element_type,
            title: String::new(),
            identifier: String::new(),
            label: String::new(),
            placeholder: None,
            value: None,
            is_enabled: true,
            is_selected: false,
            is_hittable: false,
            frame: Frame::default(),
        }
    }
}

/// An element the UI driver can describe and descend from.
pub trait UiElement {
    fn snapshot(&self) -> ElementSnapshot;

    /// Direct children in on-screen (document) order.
    fn children(&self) -> Vec<Box<dyn UiElement + '_>>;
}

/// Markup node for a single element, without children.
pub fn node_from_snapshot(snapshot: &ElementSnapshot) -> HierarchyNode {
    let mut node = HierarchyNode::new(snapshot.element_type);
    node.set_attribute("type", snapshot.element_type.tag_name());
    node.set_attribute("title", snapshot.title.as_str());
    node.set_attribute("identifier", snapshot.identifier.as_str());
    node.set_attribute("label", snapshot.label.as_str());
    if let Some(placeholder) = &snapshot.placeholder {
        node.set_attribute("placeholderValue", placeholder.as_str());
    }
    if let Some(value) = &snapshot.value {
        node.set_attribute("value", value.as_str());
    }
    node.set_attribute("isEnabled", snapshot.is_enabled.to_string());
    node.set_attribute("isSelected", snapshot.is_selected.to_string());
    node.set_attribute("isHittable", snapshot.is_hittable.to_string());
    for (name, value) in snapshot.frame.attributes() {
        node.set_attribute(name, value);
    }
    node
}

/// Build the subtree rooted at `root`, children in document order.
pub fn build_tree(root: &dyn UiElement) -> HierarchyNode {
    let mut node = node_from_snapshot(&root.snapshot());
    for child in root.children() {
        node.push_child(build_tree(child.as_ref()));
    }
    node
}
