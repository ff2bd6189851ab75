//! A small mutable DOM arena.
//!
//! Real browsers give the injected script a live, mutable `Document`. This
//! crate has no compositor or real layout engine behind it, so the host
//! (a test harness, a CLI loading a static file, or a CDP-driven controller)
//! constructs a [`Dom`] and keeps its [`Rect`]/visibility flags in sync with
//! whatever real layout exists outside this crate. Everything downstream
//! (selector engines, the poll/progress runtime, the action-readiness core)
//! only ever sees this arena.
//!
//! # Example
//! ```
//! use rfseeker::dom::{Dom, NodeData};
//!
//! let mut dom = Dom::new();
//! let root = dom.root();
//! let div = dom.create_element(root, "div");
//! dom.set_attribute(div, "id", "hello");
//! assert_eq!(dom.node(div).tag_name(), Some("div"));
//! ```

use std::collections::BTreeMap;

/// Index into the [`Dom`] arena. Stable for the lifetime of the `Dom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Component-wise equality. Deliberately does not reason about which
    /// field is "x" vs "y" — see DESIGN.md Open Question 2.
    pub fn same_position(&self, other: &Rect) -> bool {
        self.x == other.x && self.y == other.y && self.width == other.width && self.height == other.height
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileInfo {
    pub name: String,
    pub mime_type: String,
    pub buffer: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum NodeData {
    Element {
        tag_name: String,
        attributes: BTreeMap<String, String>,
        shadow_root: Option<NodeId>,
        /// Host-computed layout; defaults to empty (treated as not visible).
        rect: Rect,
        display_none: bool,
        visibility_hidden: bool,
        connected: bool,
        /// Present on `<input>`/`<textarea>`-like controls.
        value: Option<String>,
        checked: bool,
        selection_start: Option<usize>,
        selection_end: Option<usize>,
        files: Vec<FileInfo>,
    },
    Text {
        data: String,
    },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub data: NodeData,
}

impl Node {
    pub fn tag_name(&self) -> Option<&str> {
        match &self.data {
            NodeData::Element { tag_name, .. } => Some(tag_name.as_str()),
            NodeData::Text { .. } => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element { .. })
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        match &self.data {
            NodeData::Element { attributes, .. } => attributes.get(name).map(|s| s.as_str()),
            NodeData::Text { .. } => None,
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn text_data(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text { data } => Some(data.as_str()),
            NodeData::Element { .. } => None,
        }
    }
}

/// A synthetic DOM event, delivered to the host's [`EventSink`].
#[derive(Debug, Clone)]
pub struct DomEvent {
    pub event_type: String,
    pub bubbles: bool,
    pub cancelable: bool,
    pub composed: bool,
    pub init: serde_json::Value,
}

/// Host-provided sink for synthetic events fired by the action core.
///
/// A no-op default is provided so embeddings that only query and never act
/// don't need to implement anything.
pub trait EventSink {
    fn dispatch(&mut self, target: NodeId, event: DomEvent);
}

#[derive(Debug, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn dispatch(&mut self, _target: NodeId, _event: DomEvent) {}
}

/// Arena-based mutable document.
///
/// `Dom` does not itself know about CSS cascades or layout; `rect` and the
/// `display_none`/`visibility_hidden`/`connected` flags are host-managed.
#[derive(Debug)]
pub struct Dom {
    nodes: Vec<Node>,
    root: NodeId,
    pub focused: Option<NodeId>,
    /// Simplified stand-in for a live `Selection` object: `(node, start, end)`.
    pub active_selection: Option<(NodeId, usize, usize)>,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    pub fn new() -> Self {
        let root_node = Node {
            parent: None,
            children: Vec::new(),
            data: NodeData::Element {
                tag_name: "#document".to_string(),
                attributes: BTreeMap::new(),
                shadow_root: None,
                rect: Rect { x: 0.0, y: 0.0, width: 1.0, height: 1.0 },
                display_none: false,
                visibility_hidden: false,
                connected: true,
                value: None,
                checked: false,
                selection_start: None,
                selection_end: None,
                files: Vec::new(),
            },
        };
        Dom { nodes: vec![root_node], root: NodeId(0), focused: None, active_selection: None }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn create_element(&mut self, parent: NodeId, tag_name: &str) -> NodeId {
        let id = self.push_node(Node {
            parent: Some(parent),
            children: Vec::new(),
            data: NodeData::Element {
                tag_name: tag_name.to_lowercase(),
                attributes: BTreeMap::new(),
                shadow_root: None,
                rect: Rect::default(),
                display_none: false,
                visibility_hidden: false,
                connected: true,
                value: None,
                checked: false,
                selection_start: None,
                selection_end: None,
                files: Vec::new(),
            },
        });
        self.node_mut(parent).children.push(id);
        id
    }

    pub fn create_text(&mut self, parent: NodeId, data: &str) -> NodeId {
        let id = self.push_node(Node { parent: Some(parent), children: Vec::new(), data: NodeData::Text { data: data.to_string() } });
        self.node_mut(parent).children.push(id);
        id
    }

    /// Creates a detached shadow root owned by `host`, returning its id.
    pub fn attach_shadow_root(&mut self, host: NodeId) -> NodeId {
        let shadow_id = self.push_node(Node {
            parent: None,
            children: Vec::new(),
            data: NodeData::Element {
                tag_name: "#shadow-root".to_string(),
                attributes: BTreeMap::new(),
                shadow_root: None,
                rect: Rect::default(),
                display_none: false,
                visibility_hidden: false,
                connected: true,
                value: None,
                checked: false,
                selection_start: None,
                selection_end: None,
                files: Vec::new(),
            },
        });
        if let NodeData::Element { shadow_root, .. } = &mut self.node_mut(host).data {
            *shadow_root = Some(shadow_id);
        }
        shadow_id
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        match &self.node(host).data {
            NodeData::Element { shadow_root, .. } => *shadow_root,
            NodeData::Text { .. } => None,
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attributes, .. } = &mut self.node_mut(id).data {
            attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let NodeData::Element { attributes, .. } = &mut self.node_mut(id).data {
            attributes.remove(name);
        }
    }

    pub fn set_rect(&mut self, id: NodeId, rect: Rect) {
        if let NodeData::Element { rect: r, .. } = &mut self.node_mut(id).data {
            *r = rect;
        }
    }

    pub fn rect(&self, id: NodeId) -> Rect {
        match &self.node(id).data {
            NodeData::Element { rect, .. } => rect.clone(),
            NodeData::Text { .. } => Rect::default(),
        }
    }

    pub fn set_display_none(&mut self, id: NodeId, value: bool) {
        if let NodeData::Element { display_none, .. } = &mut self.node_mut(id).data {
            *display_none = value;
        }
    }

    pub fn set_visibility_hidden(&mut self, id: NodeId, value: bool) {
        if let NodeData::Element { visibility_hidden, .. } = &mut self.node_mut(id).data {
            *visibility_hidden = value;
        }
    }

    pub fn set_connected(&mut self, id: NodeId, value: bool) {
        if let NodeData::Element { connected, .. } = &mut self.node_mut(id).data {
            *connected = value;
        }
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        match &self.node(id).data {
            NodeData::Element { connected, .. } => *connected,
            NodeData::Text { .. } => self.parent(id).map(|p| self.is_connected(p)).unwrap_or(false),
        }
    }

    pub fn set_value(&mut self, id: NodeId, value: &str) {
        if let NodeData::Element { value: v, .. } = &mut self.node_mut(id).data {
            *v = Some(value.to_string());
        }
    }

    pub fn value(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Element { value, .. } => value.as_deref(),
            NodeData::Text { .. } => None,
        }
    }

    pub fn set_checked(&mut self, id: NodeId, checked: bool) {
        if let NodeData::Element { checked: c, .. } = &mut self.node_mut(id).data {
            *c = checked;
        }
    }

    pub fn checked(&self, id: NodeId) -> bool {
        match &self.node(id).data {
            NodeData::Element { checked, .. } => *checked,
            NodeData::Text { .. } => false,
        }
    }

    pub fn set_selection(&mut self, id: NodeId, start: usize, end: usize) {
        if let NodeData::Element { selection_start, selection_end, .. } = &mut self.node_mut(id).data {
            *selection_start = Some(start);
            *selection_end = Some(end);
        }
    }

    pub fn selection(&self, id: NodeId) -> Option<(usize, usize)> {
        match &self.node(id).data {
            NodeData::Element { selection_start, selection_end, .. } => Some(((*selection_start)?, (*selection_end)?)),
            NodeData::Text { .. } => None,
        }
    }

    pub fn set_files(&mut self, id: NodeId, files: Vec<FileInfo>) {
        if let NodeData::Element { files: f, .. } = &mut self.node_mut(id).data {
            *f = files;
        }
    }

    pub fn files(&self, id: NodeId) -> &[FileInfo] {
        match &self.node(id).data {
            NodeData::Element { files, .. } => files.as_slice(),
            NodeData::Text { .. } => &[],
        }
    }

    /// Whether `id` is laid out, not `display:none`/`visibility:hidden`,
    /// and connected to the document.
    pub fn is_visible(&self, id: NodeId) -> bool {
        match &self.node(id).data {
            NodeData::Element { rect, display_none, visibility_hidden, connected, .. } => {
                *connected && !*display_none && !*visibility_hidden && !rect.is_empty()
            }
            NodeData::Text { .. } => false,
        }
    }

    /// Depth-first walk of `root`'s descendants. When `pierce_shadow` is
    /// true, descends into element shadow roots as if they were children.
    pub fn descendants(&self, root: NodeId, pierce_shadow: bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();
        if let Some(shadow) = self.shadow_root(root).filter(|_| pierce_shadow) {
            stack.push(shadow);
        }
        for &c in self.children(root).iter().rev() {
            stack.push(c);
        }
        while let Some(id) = stack.pop() {
            out.push(id);
            let mut next = Vec::new();
            if pierce_shadow {
                if let Some(shadow) = self.shadow_root(id) {
                    next.push(shadow);
                }
            }
            for &c in self.children(id) {
                next.push(c);
            }
            for c in next.into_iter().rev() {
                stack.push(c);
            }
        }
        out
    }

    /// Ancestor chain starting at `id`'s parent, up to and including the
    /// document root. When `pierce_shadow`, a shadow root's walk continues
    /// at its host element (so "ancestors" crosses shadow boundaries).
    pub fn ancestors(&self, id: NodeId, pierce_shadow: bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = id;
        loop {
            if let Some(p) = self.parent(current) {
                out.push(p);
                current = p;
                continue;
            }
            if pierce_shadow {
                if let Some(host) = self.shadow_host_of(current) {
                    out.push(host);
                    current = host;
                    continue;
                }
            }
            break;
        }
        out
    }

    fn shadow_host_of(&self, shadow_root: NodeId) -> Option<NodeId> {
        self.nodes.iter().enumerate().find_map(|(i, n)| match &n.data {
            NodeData::Element { shadow_root: Some(sr), .. } if *sr == shadow_root => Some(NodeId(i)),
            _ => None,
        })
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.node(id).data {
            NodeData::Text { data } => out.push_str(data),
            NodeData::Element { .. } => {
                for &c in self.children(id) {
                    self.collect_text(c, out);
                }
            }
        }
    }
}
