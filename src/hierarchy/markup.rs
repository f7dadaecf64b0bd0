//! Element markup rendering for hierarchy snapshots.

use std::borrow::Cow;
use std::fmt::Write as _;

use super::{ElementType, HierarchyDocument, HierarchyNode};

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8" standalone="no"?>"#;

const INDENT: char = '\t';

/// Declaration line followed by exactly one document element. Several roots
/// are wrapped in an `Any` container so the result stays well-formed; an
/// empty document renders as the declaration alone.
pub fn render(doc: &HierarchyDocument) -> String {
    let mut out = String::with_capacity(64 + doc.node_count() * 96);
    out.push_str(XML_DECLARATION);
    match doc.roots.as_slice() {
        [] => {}
        [root] => {
            out.push('\n');
            write_node(&mut out, root, 0);
        }
        roots => {
            let mut container = HierarchyNode::new(ElementType::Any);
            container.set_attribute("type", ElementType::Any.tag_name());
            container.children = roots.to_vec();
            out.push('\n');
            write_node(&mut out, &container, 0);
        }
    }
    out
}

fn write_node(out: &mut String, node: &HierarchyNode, depth: usize) {
    let tag = node.element_type.tag_name();
    out.extend(std::iter::repeat_n(INDENT, depth));
    out.push('<');
    out.push_str(&tag);
    for (name, value) in &node.attributes {
        let _ = write!(out, " {name}=\"{}\"", escape_attribute(value));
    }

    if node.children.is_empty() {
        out.push_str(" />");
        return;
    }

    out.push('>');
    for child in &node.children {
        out.push('\n');
        write_node(out, child, depth + 1);
    }
    out.push('\n');
    out.extend(std::iter::repeat_n(INDENT, depth));
    let _ = write!(out, "</{tag}>");
}

/// Escape a value for use inside a double-quoted attribute. Characters not
/// allowed in XML 1.0 are dropped.
pub fn escape_attribute(value: &str) -> Cow<'_, str> {
    let needs_work = value
        .chars()
        .any(|c| matches!(c, '&' | '<' | '>' | '"' | '\'' | '\n' | '\r' | '\t') || !is_xml_char(c));
    if !needs_work {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len() + 16);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            c if is_xml_char(c) => out.push(c),
            _ => {}
        }
    }
    Cow::Owned(out)
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..)
}
