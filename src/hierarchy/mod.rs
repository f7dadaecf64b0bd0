//! Snapshot of the on-screen UI tree, rendered as element markup.
//!
//! Two acquisition strategies produce the same [`HierarchyDocument`]:
//!
//! - [`traversal`]: walk a live element tree exposed by the UI driver
//!   (primary, used whenever the driver can hand out a root element)
//! - [`text_dump`]: parse the driver's indented debug description
//!   (fallback when no structured query is available)
//!
//! Either way the result is rendered by [`markup`].

pub mod markup;
pub mod text_dump;
pub mod traversal;

use tracing::{debug, warn};

use crate::driver::UiDriver;
use text_dump::DumpParser;

const TAG_PREFIX: &str = "XCUIElementType";

macro_rules! element_types {
    ($($variant:ident),+ $(,)?) => {
        /// UI element kinds; the fixed vocabulary of markup tag names.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ElementType {
            $($variant,)+
            /// Fallback for kinds outside the vocabulary.
            Any,
        }

        impl ElementType {
            /// Bare kind name, e.g. `Button`.
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)+
                    Self::Any => "Any",
                }
            }

            /// Parse `Button` or `XCUIElementTypeButton`; unknown names map to `Any`.
            pub fn from_name(name: &str) -> Self {
                let bare = name.trim();
                let bare = bare.strip_prefix(TAG_PREFIX).unwrap_or(bare);
                match bare {
                    $(stringify!($variant) => Self::$variant,)+
                    _ => Self::Any,
                }
            }
        }
    };
}

element_types! {
    ActivityIndicator,
    Alert,
    Application,
    Browser,
    Button,
    Cell,
    CheckBox,
    CollectionView,
    ComboBox,
    DatePicker,
    Dialog,
    Icon,
    Image,
    Key,
    Keyboard,
    LayoutArea,
    LayoutItem,
    LevelIndicator,
    Link,
    Map,
    Menu,
    MenuItem,
    NavigationBar,
    Other,
    PageIndicator,
    Picker,
    PickerWheel,
    Popover,
    ProgressIndicator,
    RadioButton,
    RadioGroup,
    ScrollBar,
    ScrollView,
    SearchField,
    SecureTextField,
    SegmentedControl,
    Slider,
    StaticText,
    StatusBar,
    Switch,
    TabBar,
    Table,
    TableColumn,
    TableRow,
    TextField,
    TextView,
    Toggle,
    Toolbar,
    ValueIndicator,
    WebView,
    Window,
}

impl ElementType {
    /// Markup tag, e.g. `XCUIElementTypeButton`.
    pub fn tag_name(self) -> String {
        format!("{TAG_PREFIX}{}", self.name())
    }
}

/// Element geometry in points.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Frame {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// `x`, `y`, `width`, `height` attributes, rounded to whole points.
    pub fn attributes(&self) -> [(&'static str, String); 4] {
        [
            ("x", round_point(self.x)),
            ("y", round_point(self.y)),
            ("width", round_point(self.width)),
            ("height", round_point(self.height)),
        ]
    }
}

fn round_point(v: f64) -> String {
    (v.round() as i64).to_string()
}

/// One element in the snapshot. Children are owned by their parent.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyNode {
    pub element_type: ElementType,
    /// Attribute name/value pairs, in insertion order, names unique.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    pub fn new(element_type: ElementType) -> Self {
        Self {
            element_type,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Set an attribute, replacing any previous value for `name`.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn push_child(&mut self, child: HierarchyNode) {
        self.children.push(child);
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(HierarchyNode::count).sum::<usize>()
    }
}

/// A snapshot: zero or more top-level elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HierarchyDocument {
    pub roots: Vec<HierarchyNode>,
}

impl HierarchyDocument {
    pub fn single(root: HierarchyNode) -> Self {
        Self { roots: vec![root] }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.roots.iter().map(HierarchyNode::count).sum()
    }

    pub fn to_markup(&self) -> String {
        markup::render(self)
    }
}

/// Captures a [`HierarchyDocument`] from a UI driver, picking one strategy.
#[derive(Debug, Clone, Default)]
pub struct HierarchySerializer {
    parser: DumpParser,
}

impl HierarchySerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parser(parser: DumpParser) -> Self {
        Self { parser }
    }

    /// Structured traversal when the driver exposes a root element, otherwise
    /// the text dump. An unavailable driver yields an empty document.
    pub fn snapshot(&self, driver: &dyn UiDriver) -> HierarchyDocument {
        if let Some(root) = driver.root_element() {
            let doc = HierarchyDocument::single(traversal::build_tree(root.as_ref()));
            debug!(nodes = doc.node_count(), "hierarchy: captured by traversal");
            return doc;
        }

        match driver.debug_dump() {
            Ok(dump) => {
                let doc = self.parser.parse(&dump);
                if doc.is_empty() {
                    warn!("hierarchy: debug dump contained no parseable elements");
                } else {
                    debug!(nodes = doc.node_count(), "hierarchy: captured from debug dump");
                }
                doc
            }
            Err(e) => {
                warn!(error = %e, "hierarchy: no snapshot available from UI driver");
                HierarchyDocument::default()
            }
        }
    }

    /// Snapshot rendered to markup.
    pub fn capture(&self, driver: &dyn UiDriver) -> String {
        self.snapshot(driver).to_markup()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverError;
    use crate::hierarchy::traversal::{ElementSnapshot, UiElement};

    #[test]
    fn element_type_names_round_trip() {
        assert_eq!(ElementType::from_name("Button"), ElementType::Button);
        assert_eq!(ElementType::from_name("XCUIElementTypeTable"), ElementType::Table);
        assert_eq!(ElementType::from_name("Hologram"), ElementType::Any);
        assert_eq!(ElementType::TextField.tag_name(), "XCUIElementTypeTextField");
        assert_eq!(ElementType::Any.tag_name(), "XCUIElementTypeAny");
    }

    #[test]
    fn frame_attributes_are_rounded() {
        let attrs = Frame::new(10.4, 20.6, 100.5, -0.4).attributes();
        let values: Vec<&str> = attrs.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(values, vec!["10", "21", "101", "0"]);
    }

    #[test]
    fn set_attribute_replaces_in_place() {
        let mut node = HierarchyNode::new(ElementType::Button);
        node.set_attribute("label", "Old");
        node.set_attribute("identifier", "btn");
        node.set_attribute("label", "New");
        assert_eq!(node.attribute("label"), Some("New"));
        assert_eq!(node.attributes[0].0, "label");
        assert_eq!(node.attributes.len(), 2);
    }

    struct Leaf;

    impl UiElement for Leaf {
        fn snapshot(&self) -> ElementSnapshot {
            ElementSnapshot::new(ElementType::Application)
        }

        fn children(&self) -> Vec<Box<dyn UiElement + '_>> {
            Vec::new()
        }
    }

    struct FakeDriver {
        live: bool,
        dump: Option<&'static str>,
    }

    impl UiDriver for FakeDriver {
        fn screenshot_png(&self) -> Result<Vec<u8>, DriverError> {
            Err(DriverError::Unavailable("no screen".into()))
        }

        fn root_element(&self) -> Option<Box<dyn UiElement + '_>> {
            self.live.then(|| Box::new(Leaf) as Box<dyn UiElement>)
        }

        fn debug_dump(&self) -> Result<String, DriverError> {
            self.dump
                .map(str::to_string)
                .ok_or_else(|| DriverError::Unavailable("no dump".into()))
        }
    }

    #[test]
    fn prefers_live_tree_over_dump() {
        let driver = FakeDriver {
            live: true,
            dump: Some("Element subtree:\n →Button, 0x1, {{0, 0}, {1, 1}}\n"),
        };
        let doc = HierarchySerializer::new().snapshot(&driver);
        assert_eq!(doc.roots.len(), 1);
        assert_eq!(doc.roots[0].element_type, ElementType::Application);
    }

    #[test]
    fn falls_back_to_dump() {
        let driver = FakeDriver {
            live: false,
            dump: Some("Element subtree:\n →Button, 0x1, {{0, 0}, {1, 1}}\nPath to element:\n"),
        };
        let doc = HierarchySerializer::new().snapshot(&driver);
        assert_eq!(doc.roots.len(), 1);
        assert_eq!(doc.roots[0].element_type, ElementType::Button);
    }

    #[test]
    fn unavailable_driver_yields_empty_markup() {
        let driver = FakeDriver {
            live: false,
            dump: None,
        };
        let markup = HierarchySerializer::new().capture(&driver);
        assert_eq!(markup.trim(), markup::XML_DECLARATION);
    }
}
