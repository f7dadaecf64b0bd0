//! Tree reconstruction from the driver's indented debug description.
//!
//! A dump looks like:
//!
//! ```text
//! Attributes: Application, 0x600000c1c000, pid: 4242, label: 'Demo'
//! Element subtree:
//!  →Application, 0x600000c1c000, pid: 4242, label: 'Demo'
//!     Window (Main), 0x600000c1c1c0, {{0.0, 0.0}, {390.0, 844.0}}
//!       Button, 0x600000c1c380, {{16.0, 80.0}, {120.0, 44.0}}, identifier: 'login', label: 'Log In'
//! Path to element:
//!  →Application, 0x600000c1c000, pid: 4242, label: 'Demo'
//! ```
//!
//! Only the region between the start and end markers is parsed. Depth is the
//! indent width (spaces and `→`) divided by two. Geometry is optional, since
//! the application line usually carries none; lines that don't start with a
//! kind and a reference id are skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use super::{ElementType, Frame, HierarchyDocument, HierarchyNode};

pub const SUBTREE_START: &str = "Element subtree:";
pub const SUBTREE_END: &str = "Path to element:";

const NUM: &str = r"-?\d+(?:\.\d+)?";

static ELEMENT_LINE: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(
        r"^(?P<indent>[\s→]*)(?P<kind>[A-Za-z]+)(?:\s*\((?P<title>[^)]*)\))?,\s*(?P<ref>0x[0-9A-Fa-f]+)(?:,\s*\{{\{{(?P<x>{NUM}),\s*(?P<y>{NUM})\}},\s*\{{(?P<w>{NUM}),\s*(?P<h>{NUM})\}}\}})?(?:,\s*(?P<extra>.*))?$"
    );
    Regex::new(&pattern).expect("element line regex")
});

static QUOTED_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<key>[A-Za-z]+): '(?P<value>.*?)'(?:,\s*|$)").expect("quoted attribute regex")
});

/// One parsed dump line.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpLine {
    pub depth: usize,
    pub node: HierarchyNode,
}

/// Parse a single element line, or `None` if it doesn't describe an element.
pub fn parse_line(line: &str) -> Option<DumpLine> {
    let caps = ELEMENT_LINE.captures(line.trim_end())?;

    let depth = caps.name("indent").map_or(0, |m| m.as_str().chars().count()) / 2;
    let element_type = ElementType::from_name(&caps["kind"]);
    let coord = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<f64>().ok());
    let frame = match (coord("x"), coord("y"), coord("w"), coord("h")) {
        (Some(x), Some(y), Some(w), Some(h)) => Some(Frame::new(x, y, w, h)),
        _ => None,
    };

    let mut node = HierarchyNode::new(element_type);
    node.set_attribute("type", element_type.tag_name());
    if let Some(title) = caps.name("title") {
        node.set_attribute("title", title.as_str());
    }
    node.set_attribute("ref", &caps["ref"]);
    for (name, value) in frame.iter().flat_map(Frame::attributes) {
        node.set_attribute(name, value);
    }

    let mut enabled = true;
    let mut selected = false;
    if let Some(extra) = caps.name("extra") {
        let extra = extra.as_str();
        for kv in QUOTED_ATTRIBUTE.captures_iter(extra) {
            node.set_attribute(&kv["key"], &kv["value"]);
        }
        let flags = QUOTED_ATTRIBUTE.replace_all(extra, "");
        for flag in flags.split(',').map(str::trim) {
            match flag {
                "Disabled" => enabled = false,
                "Selected" => selected = true,
                "Focused" => node.set_attribute("hasFocus", "true"),
                _ => {}
            }
        }
    }
    node.set_attribute("isEnabled", enabled.to_string());
    node.set_attribute("isSelected", selected.to_string());

    Some(DumpLine { depth, node })
}

/// Rebuilds a [`HierarchyDocument`] from a debug dump.
#[derive(Debug, Clone)]
pub struct DumpParser {
    start_marker: String,
    end_marker: String,
}

impl Default for DumpParser {
    fn default() -> Self {
        Self::new(SUBTREE_START, SUBTREE_END)
    }
}

impl DumpParser {
    pub fn new(start_marker: impl Into<String>, end_marker: impl Into<String>) -> Self {
        Self {
            start_marker: start_marker.into(),
            end_marker: end_marker.into(),
        }
    }

    /// Lines strictly between the start marker and the end marker (or the end
    /// of the dump). Empty if the start marker never appears.
    fn region<'a>(&self, dump: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let start = self.start_marker.clone();
        let end = self.end_marker.clone();
        dump.lines()
            .skip_while(move |l| !l.trim_start().starts_with(start.as_str()))
            .skip(1)
            .take_while(move |l| !l.trim_start().starts_with(end.as_str()))
    }

    pub fn parse(&self, dump: &str) -> HierarchyDocument {
        let mut roots = Vec::new();
        let mut stack: Vec<DumpLine> = Vec::new();

        for line in self.region(dump) {
            if line.trim().is_empty() {
                continue;
            }
            let Some(parsed) = parse_line(line) else {
                warn!(line = line.trim(), "hierarchy dump: skipping unparseable line");
                continue;
            };
            while stack.last().is_some_and(|top| top.depth >= parsed.depth) {
                attach_top(&mut stack, &mut roots);
            }
            stack.push(parsed);
        }
        while !stack.is_empty() {
            attach_top(&mut stack, &mut roots);
        }

        HierarchyDocument { roots }
    }
}

/// Pop the top entry into its parent, or into `roots` when nothing is below it.
fn attach_top(stack: &mut Vec<DumpLine>, roots: &mut Vec<HierarchyNode>) {
    let Some(top) = stack.pop() else {
        return;
    };
    match stack.last_mut() {
        Some(parent) => parent.node.push_child(top.node),
        None => roots.push(top.node),
    }
}
