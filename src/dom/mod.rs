//! Document model - arena-backed element tree
//!
//! The runtime has no browser underneath it, so this module stands in for the
//! parts of the DOM the widgets rely on: elements with attributes and inline
//! styles, shadow roots, focus, inertness and bounding rectangles.
//!
//! Detached subtrees simply have no parent and stay usable until they are
//! reclaimed with [`Document::discard`] (or [`Document::clear_children`]).
//! Reclaimed slots are reused; a `NodeId` carries the slot generation, so a
//! stale handle reads as an empty detached node and writes through it are
//! ignored.
//!
//! # Parents
//!
//! There are two parent relations:
//!
//! - the *physical* parent (`parent`), used for connectedness, inertness and
//!   tree order
//! - the *logical* parent (`logical_parent`), which follows a shadow root or a
//!   portal layer to the host that owns it. Event paths and "is this inside
//!   the widget" checks use this one, so a modal's dialog still belongs to its
//!   host after it has been moved into the overlay root.

mod markup;
mod selector;

pub use markup::{parse_fragment, MarkupError};
pub use selector::Selector;

use std::collections::BTreeMap;

/// Handle to a node in a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Raw arena index
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// Bounding rectangle in viewport coordinates (CSS pixels)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attrs: BTreeMap<String, String>,
        style: BTreeMap<String, String>,
    },
    Text(String),
    Fragment,
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Shadow root attached to this host
    shadow_root: Option<NodeId>,
    /// Host owning this fragment (shadow roots and portal layers)
    owner: Option<NodeId>,
    bounds: Option<Rect>,
}

/// What a stale handle reads as
static DEAD: NodeData = NodeData::new(NodeKind::Fragment);

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    data: NodeData,
}

/// The element tree
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Slot>,
    /// Reclaimed slot indices
    free: Vec<u32>,
    /// Portal layers by owning host
    layers: BTreeMap<NodeId, Vec<NodeId>>,
    root: NodeId,
    body: NodeId,
    active: Option<NodeId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document containing `<html><body></body></html>`
    pub fn new() -> Self {
        let placeholder = NodeId {
            index: 0,
            generation: 0,
        };
        let mut doc = Self {
            nodes: Vec::new(),
            free: Vec::new(),
            layers: BTreeMap::new(),
            root: placeholder,
            body: placeholder,
            active: None,
        };
        let root = doc.create_element("html");
        let body = doc.create_element("body");
        doc.append_child(root, body);
        doc.root = root;
        doc.body = body;
        doc
    }

    /// The `<html>` element
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The `<body>` element
    pub fn body(&self) -> NodeId {
        self.body
    }

    fn node(&self, id: NodeId) -> &NodeData {
        self.nodes
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .map_or(&DEAD, |slot| &slot.data)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .map(|slot| &mut slot.data)
    }

    /// Whether `id` still names a node (it has not been reclaimed)
    pub fn is_live(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.index())
            .is_some_and(|slot| slot.generation == id.generation)
    }

    /// Number of live nodes, attached or not
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let data = NodeData::new(kind);
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.nodes[index as usize];
                slot.data = data;
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.nodes.len() as u32;
                self.nodes.push(Slot {
                    generation: 0,
                    data,
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Construction
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            style: BTreeMap::new(),
        })
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    /// Create a detached fragment (template clones, overlay layers)
    pub fn create_fragment(&mut self) -> NodeId {
        self.push(NodeKind::Fragment)
    }

    /// Attach (or return the existing) shadow root of `host`
    pub fn attach_shadow(&mut self, host: NodeId) -> NodeId {
        if let Some(existing) = self.node(host).shadow_root {
            return existing;
        }
        let root = self.create_fragment();
        if let Some(fragment) = self.node_mut(root) {
            fragment.owner = Some(host);
        }
        if let Some(host) = self.node_mut(host) {
            host.shadow_root = Some(root);
        }
        root
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.node(host).shadow_root
    }

    /// Mark `node` as owned by `host` (portal layers); owned nodes report
    /// the host as their logical parent
    pub fn set_owner(&mut self, node: NodeId, host: Option<NodeId>) {
        let Some(data) = self.node_mut(node) else {
            return;
        };
        let previous = std::mem::replace(&mut data.owner, host);
        if let Some(previous) = previous {
            self.unindex_layer(previous, node);
        }
        if let Some(host) = host {
            self.layers.entry(host).or_default().push(node);
        }
    }

    fn unindex_layer(&mut self, host: NodeId, layer: NodeId) {
        if let Some(owned) = self.layers.get_mut(&host) {
            owned.retain(|l| *l != layer);
            if owned.is_empty() {
                self.layers.remove(&host);
            }
        }
    }

    pub fn owner(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).owner
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Node inspection
    // ─────────────────────────────────────────────────────────────────────────

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Element { .. })
    }

    pub fn is_fragment(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Fragment)
    }

    /// Text of a text node
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tree structure
    // ─────────────────────────────────────────────────────────────────────────

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|c| *c == id)?;
        siblings.get(index + 1).copied()
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    /// Remove `id` from its parent (no-op when already detached)
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).parent {
            if let Some(parent) = self.node_mut(parent) {
                parent.children.retain(|c| *c != id);
            }
            if let Some(node) = self.node_mut(id) {
                node.parent = None;
            }
        }
        // A removed subtree cannot keep focus
        if let Some(active) = self.active {
            if !self.is_connected(active) {
                self.active = None;
            }
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` before `reference`; appends when `reference` is `None`
    /// or no longer a child of `parent`
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        debug_assert!(!self.is_physical_ancestor(child, parent), "cycle");
        if !self.is_live(parent) || !self.is_live(child) {
            return;
        }
        self.remove(child);
        let position = reference
            .and_then(|r| self.children(parent).iter().position(|c| *c == r))
            .unwrap_or(self.children(parent).len());
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.insert(position, child);
        }
    }

    /// Move every child of `from` to the end of `to`
    pub fn move_children(&mut self, from: NodeId, to: NodeId) {
        for child in self.children(from).to_vec() {
            self.append_child(to, child);
        }
    }

    /// Remove and reclaim every child of `id`
    pub fn clear_children(&mut self, id: NodeId) {
        for child in self.children(id).to_vec() {
            self.discard(child);
        }
    }

    /// Detach `id` and reclaim it together with its subtree and the shadow
    /// roots of elements in it
    ///
    /// Portal layers owned by hosts in the subtree are left to whoever opened
    /// them. The document element and `<body>` are never reclaimed.
    pub fn discard(&mut self, id: NodeId) {
        if !self.is_live(id) || id == self.root || id == self.body {
            return;
        }
        self.remove(id);

        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            let Some(slot) = self
                .nodes
                .get_mut(n.index())
                .filter(|slot| slot.generation == n.generation)
            else {
                continue;
            };
            let data = std::mem::replace(&mut slot.data, NodeData::new(NodeKind::Fragment));
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(n.index);

            if let Some(owner) = data.owner {
                self.unindex_layer(owner, n);
            }
            self.layers.remove(&n);
            if self.active == Some(n) {
                self.active = None;
            }
            stack.extend(data.children);
            stack.extend(data.shadow_root);
        }
    }

    fn is_physical_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.node(n).parent;
        }
        false
    }

    /// Preorder descendants of `id` (excluding `id`), not entering shadow roots
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Attributes, classes, inline style
    // ─────────────────────────────────────────────────────────────────────────

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            _ => None,
        }
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    /// Set an attribute, returning the previous value
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) -> Option<String> {
        match self.node_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Element { attrs, .. }) => attrs.insert(name.to_string(), value.into()),
            _ => None,
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        match self.node_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Element { attrs, .. }) => attrs.remove(name),
            _ => None,
        }
    }

    /// Boolean attribute presence; returns whether anything changed
    pub fn toggle_attr(&mut self, id: NodeId, name: &str, on: bool) -> bool {
        match (on, self.has_attr(id, name)) {
            (true, false) => {
                self.set_attr(id, name, "");
                true
            }
            (false, true) => {
                self.remove_attr(id, name);
                true
            }
            _ => false,
        }
    }

    pub fn attrs(&self, id: NodeId) -> Vec<(&str, &str)> {
        match &self.node(id).kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .map(|c| c.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn toggle_class(&mut self, id: NodeId, class: &str, on: bool) {
        let mut classes: Vec<String> = self
            .attr(id, "class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let present = classes.iter().any(|c| c == class);
        if on && !present {
            classes.push(class.to_string());
        } else if !on && present {
            classes.retain(|c| c != class);
        } else {
            return;
        }
        if classes.is_empty() {
            self.remove_attr(id, "class");
        } else {
            self.set_attr(id, "class", classes.join(" "));
        }
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        self.toggle_class(id, class, true);
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        self.toggle_class(id, class, false);
    }

    pub fn style(&self, id: NodeId, property: &str) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { style, .. } => style.get(property).map(String::as_str),
            _ => None,
        }
    }

    /// Set an inline style property; an empty value removes it
    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) {
        if let Some(NodeKind::Element { style, .. }) = self.node_mut(id).map(|n| &mut n.kind) {
            if value.is_empty() {
                style.remove(property);
            } else {
                style.insert(property.to_string(), value.to_string());
            }
        }
    }

    pub fn remove_style(&mut self, id: NodeId, property: &str) -> Option<String> {
        match self.node_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Element { style, .. }) => style.remove(property),
            _ => None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Text
    // ─────────────────────────────────────────────────────────────────────────

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    /// Replace all children with a single text node
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        self.clear_children(id);
        if !text.is_empty() {
            let node = self.create_text(text);
            self.append_child(id, node);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Geometry
    // ─────────────────────────────────────────────────────────────────────────

    pub fn set_bounds(&mut self, id: NodeId, rect: Rect) {
        if let Some(node) = self.node_mut(id) {
            node.bounds = Some(rect);
        }
    }

    pub fn bounds(&self, id: NodeId) -> Option<Rect> {
        self.node(id).bounds
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Composed tree
    // ─────────────────────────────────────────────────────────────────────────

    /// Physical parent, or the host for a detached shadow root
    fn composed_parent(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id);
        match node.parent {
            Some(parent) => Some(parent),
            None if node.shadow_root_of().is_some() => node.owner,
            None => None,
        }
    }

    /// Owning host for shadow roots and portal layers, otherwise the parent
    pub fn logical_parent(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id);
        node.owner.or(node.parent)
    }

    /// Whether `id` is reachable from `<html>`
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(n) = current {
            if n == self.root {
                return true;
            }
            current = self.composed_parent(n);
        }
        false
    }

    /// Whether `id` or any ancestor carries the `inert` attribute
    pub fn is_inert(&self, id: NodeId) -> bool {
        self.composed_ancestors(id)
            .into_iter()
            .any(|n| self.has_attr(n, "inert"))
    }

    fn is_hidden(&self, id: NodeId) -> bool {
        self.composed_ancestors(id)
            .into_iter()
            .any(|n| self.has_attr(n, "hidden"))
    }

    /// Ancestors in the flattened tree: light children of a shadow host
    /// hang off the slot that renders them
    fn composed_ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = Some(id);
        while let Some(n) = current {
            out.push(n);
            current = self.assigned_slot(n).or_else(|| self.composed_parent(n));
        }
        out
    }

    /// Slot in the parent host's shadow tree that renders `id`
    fn assigned_slot(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id).parent?;
        let shadow = self.node(parent).shadow_root?;
        self.slot_within(shadow, parent)
    }

    fn slot_within(&self, root: NodeId, host: NodeId) -> Option<NodeId> {
        // The region wrapper may currently live in a portal layer
        let mut stack: Vec<NodeId> = self.children(root).to_vec();
        for layer in self.layers.get(&host).into_iter().flatten() {
            if *layer != root && self.node(*layer).parent.is_some() {
                stack.extend(self.children(*layer).iter().copied());
            }
        }
        while let Some(n) = stack.pop() {
            if self.tag(n) == Some("slot") {
                return Some(n);
            }
            stack.extend(self.children(n).iter().copied());
        }
        None
    }

    /// Event propagation path, innermost first
    pub fn event_path(&self, target: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = Some(target);
        while let Some(n) = current {
            out.push(n);
            current = self.logical_parent(n);
        }
        out
    }

    /// Whether `node` is `ancestor` or logically inside it
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.event_path(node).contains(&ancestor)
    }

    /// Host whose shadow tree (or portal layer) contains `id`, by physical
    /// ancestry
    pub fn scope_host(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(n) = current {
            let node = self.node(n);
            if node.owner.is_some() {
                return node.owner;
            }
            current = node.parent;
        }
        None
    }

    /// First physical ancestor-or-self of `id` matching `selector`, not
    /// walking above `limit`
    pub fn closest(&self, id: NodeId, selector: &str, limit: NodeId) -> Option<NodeId> {
        let selector = Selector::parse(selector)?;
        let mut current = Some(id);
        while let Some(n) = current {
            if selector.matches(self, n) {
                return Some(n);
            }
            if n == limit {
                break;
            }
            current = self.node(n).parent;
        }
        None
    }

    /// First descendant of `root` matching `selector`
    pub fn query(&self, root: NodeId, selector: &str) -> Option<NodeId> {
        let selector = Selector::parse(selector)?;
        self.descendants(root)
            .into_iter()
            .find(|n| selector.matches(self, *n))
    }

    /// Every descendant of `root` matching `selector`, in tree order
    pub fn query_all(&self, root: NodeId, selector: &str) -> Vec<NodeId> {
        let Some(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        self.descendants(root)
            .into_iter()
            .filter(|n| selector.matches(self, *n))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Focus
    // ─────────────────────────────────────────────────────────────────────────

    pub fn active_element(&self) -> Option<NodeId> {
        self.active
    }

    /// Move focus to `id`; refused for disconnected, inert or non-element nodes
    pub fn focus(&mut self, id: NodeId) -> bool {
        if !self.is_element(id) || !self.is_connected(id) || self.is_inert(id) {
            return false;
        }
        self.active = Some(id);
        true
    }

    pub fn blur(&mut self) {
        self.active = None;
    }

    /// Whether `id` takes part in sequential focus navigation
    pub fn is_focusable(&self, id: NodeId) -> bool {
        let Some(tag) = self.tag(id) else {
            return false;
        };
        if self.has_class(id, "focus-sentinel") || self.is_hidden(id) {
            return false;
        }
        let enabled = !self.has_attr(id, "disabled");
        let by_tag = match tag {
            "a" | "area" => self.has_attr(id, "href"),
            "button" | "select" | "textarea" => enabled,
            "input" => enabled && self.attr(id, "type") != Some("hidden"),
            "iframe" => true,
            "audio" | "video" => self.has_attr(id, "controls"),
            _ => false,
        };
        let editable = self
            .attr(id, "contenteditable")
            .is_some_and(|v| v != "false");
        let tabbable = self.attr(id, "tabindex").is_some_and(|v| v != "-1");
        by_tag || editable || tabbable
    }

    /// Focusable nodes under `root` in flattened tree order
    ///
    /// Shadow roots replace their host's light children, and `<slot>`
    /// elements expand to the light children of the host that owns them.
    pub fn focusables_within(&self, root: NodeId) -> Vec<NodeId> {
        let mut flat = Vec::new();
        for child in self.children(root) {
            self.flat_visit(*child, &mut flat);
        }
        flat.into_iter()
            .filter(|n| self.is_focusable(*n))
            .collect()
    }

    /// Document-wide sequential focus order, skipping inert content
    pub fn tab_order(&self) -> Vec<NodeId> {
        let mut flat = Vec::new();
        self.flat_visit(self.root, &mut flat);
        flat.into_iter()
            .filter(|n| self.is_focusable(*n) && !self.is_inert(*n))
            .collect()
    }

    fn flat_visit(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        if let Some(shadow) = self.node(id).shadow_root {
            for child in self.children(shadow) {
                self.flat_visit(*child, out);
            }
            return;
        }
        if self.tag(id) == Some("slot") {
            if let Some(host) = self.scope_host(id) {
                for child in self.children(host) {
                    self.flat_visit(*child, out);
                }
                return;
            }
        }
        for child in self.children(id) {
            self.flat_visit(*child, out);
        }
    }
}

impl NodeData {
    const fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            shadow_root: None,
            owner: None,
            bounds: None,
        }
    }

    /// Owner when this node is a shadow root (fragment with an owner)
    fn shadow_root_of(&self) -> Option<NodeId> {
        match self.kind {
            NodeKind::Fragment => self.owner,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_before_missing_reference_appends() {
        let mut doc = Document::new();
        let body = doc.body();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        let stray = doc.create_element("div");
        doc.append_child(body, a);
        doc.insert_before(body, b, Some(stray));
        assert_eq!(doc.children(body), &[a, b]);
    }

    #[test]
    fn test_shadow_content_is_connected_through_host() {
        let mut doc = Document::new();
        let host = doc.create_element("app-modal");
        let shadow = doc.attach_shadow(host);
        let inner = doc.create_element("button");
        doc.append_child(shadow, inner);
        assert!(!doc.is_connected(inner));

        doc.append_child(doc.body(), host);
        assert!(doc.is_connected(inner));
        assert_eq!(doc.event_path(inner), vec![inner, shadow, host, doc.body(), doc.root()]);
    }

    #[test]
    fn test_inert_ancestor_blocks_focus() {
        let mut doc = Document::new();
        let section = doc.create_element("section");
        let button = doc.create_element("button");
        doc.append_child(doc.body(), section);
        doc.append_child(section, button);
        doc.set_attr(section, "inert", "");
        assert!(!doc.focus(button));
        doc.remove_attr(section, "inert");
        assert!(doc.focus(button));
        assert_eq!(doc.active_element(), Some(button));
    }

    #[test]
    fn test_detaching_focused_subtree_clears_focus() {
        let mut doc = Document::new();
        let wrapper = doc.create_element("div");
        let input = doc.create_element("input");
        doc.append_child(doc.body(), wrapper);
        doc.append_child(wrapper, input);
        doc.focus(input);
        doc.remove(wrapper);
        assert_eq!(doc.active_element(), None);
    }

    #[test]
    fn test_discard_reclaims_subtree_and_reuses_slots() {
        let mut doc = Document::new();
        let baseline = doc.node_count();

        let host = doc.create_element("app-modal");
        let shadow = doc.attach_shadow(host);
        let dialog = doc.create_element("div");
        doc.append_child(shadow, dialog);
        doc.append_child(doc.body(), host);
        assert!(doc.focus(dialog));
        assert_eq!(doc.node_count(), baseline + 3);

        doc.discard(host);
        assert_eq!(doc.node_count(), baseline);
        assert!(!doc.is_live(host));
        assert!(!doc.is_live(dialog));
        assert_eq!(doc.active_element(), None);
        assert!(doc.children(doc.body()).is_empty());

        // Stale handles read as empty detached nodes and ignore writes
        assert_eq!(doc.tag(dialog), None);
        assert_eq!(doc.set_attr(dialog, "class", "x"), None);
        doc.append_child(doc.body(), dialog);
        assert!(doc.children(doc.body()).is_empty());

        // Reclaimed slots come back under a new generation
        let fresh = doc.create_element("p");
        assert!([host.index(), shadow.index(), dialog.index()].contains(&fresh.index()));
        assert_ne!(fresh, host);
        assert_ne!(fresh, dialog);
        assert_eq!(doc.tag(fresh), Some("p"));

        // The document element and body are never reclaimed
        doc.discard(doc.body());
        assert!(doc.is_live(doc.body()));
    }

    #[test]
    fn test_clear_children_reclaims_nodes() {
        let mut doc = Document::new();
        let list = doc.create_element("ul");
        doc.append_child(doc.body(), list);
        let before = doc.node_count();
        for _ in 0..100 {
            doc.clear_children(list);
            for label in ["a", "b", "c"] {
                let li = doc.create_element("li");
                doc.append_child(list, li);
                doc.set_text_content(li, label);
            }
        }
        assert_eq!(doc.node_count(), before + 6);
        assert_eq!(doc.text_content(list), "abc");
    }

    #[test]
    fn test_focusable_rules() {
        let mut doc = Document::new();
        let body = doc.body();
        let make = |doc: &mut Document, tag: &str, attrs: &[(&str, &str)]| {
            let el = doc.create_element(tag);
            for (k, v) in attrs {
                doc.set_attr(el, k, *v);
            }
            doc.append_child(body, el);
            el
        };
        let link = make(&mut doc, "a", &[("href", "/x")]);
        let bare_link = make(&mut doc, "a", &[]);
        let disabled = make(&mut doc, "button", &[("disabled", "")]);
        let hidden_input = make(&mut doc, "input", &[("type", "hidden")]);
        let sentinel = make(&mut doc, "span", &[("tabindex", "0"), ("class", "focus-sentinel")]);
        let negative = make(&mut doc, "div", &[("tabindex", "-1")]);
        let editable = make(&mut doc, "div", &[("contenteditable", "true")]);

        assert!(doc.is_focusable(link));
        assert!(!doc.is_focusable(bare_link));
        assert!(!doc.is_focusable(disabled));
        assert!(!doc.is_focusable(hidden_input));
        assert!(!doc.is_focusable(sentinel));
        assert!(!doc.is_focusable(negative));
        assert!(doc.is_focusable(editable));
    }

    #[test]
    fn test_slot_expands_to_light_children() {
        let mut doc = Document::new();
        let host = doc.create_element("app-modal");
        doc.append_child(doc.body(), host);
        let light = doc.create_element("button");
        doc.append_child(host, light);

        let shadow = doc.attach_shadow(host);
        let dialog = doc.create_element("div");
        let close = doc.create_element("button");
        let slot = doc.create_element("slot");
        doc.append_child(shadow, dialog);
        doc.append_child(dialog, close);
        doc.append_child(dialog, slot);

        assert_eq!(doc.focusables_within(dialog), vec![close, light]);
        assert_eq!(doc.tab_order(), vec![close, light]);
    }

    #[test]
    fn test_class_toggling() {
        let mut doc = Document::new();
        let el = doc.create_element("li");
        doc.add_class(el, "rs__item");
        doc.add_class(el, "rs__item--active");
        doc.add_class(el, "rs__item");
        assert_eq!(doc.attr(el, "class"), Some("rs__item rs__item--active"));
        doc.remove_class(el, "rs__item--active");
        assert!(!doc.has_class(el, "rs__item--active"));
        doc.remove_class(el, "rs__item");
        assert_eq!(doc.attr(el, "class"), None);
    }
}
