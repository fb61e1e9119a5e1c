//! Overlay manager - page lock and portal layers for modal widgets
//!
//! One manager per runtime. Widgets that need to escape their ancestors'
//! clipping and stacking ask it for a *layer*: an element inside the overlay
//! root (the last child of `<body>`) that is owned by the widget's host, so
//! events raised inside it still travel through the host.
//!
//! ```text
//! <body>
//!   <main inert>…<app-modal/>…</main>      ← recorded, un-inerted on release
//!   <div data-overlay-root>
//!     <div class="overlay-layer" inert>    ← lower layer (owner: modal A)
//!     <div class="overlay-layer">          ← top layer   (owner: modal B)
//!   </div>
//! </body>
//! ```
//!
//! The page lock (root `overflow: hidden` plus background inertness) is
//! taken by the first layer and released by the last, whatever order the
//! layers are closed in. Only the topmost layer is interactive.

use crate::dom::{Document, NodeId};

const LAYER_CLASS: &str = "overlay-layer";

#[derive(Debug)]
struct Layer {
    host: NodeId,
    element: NodeId,
}

/// Saved page state while at least one layer is open
#[derive(Debug)]
struct PageLock {
    /// Root `overflow` before locking (None = was unset)
    overflow: Option<String>,
    /// Body children this manager marked inert
    inerted: Vec<NodeId>,
}

#[derive(Debug, Default)]
pub struct OverlayManager {
    root: Option<NodeId>,
    layers: Vec<Layer>,
    lock: Option<PageLock>,
}

impl OverlayManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The overlay root, once created
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    pub fn layer_of(&self, host: NodeId) -> Option<NodeId> {
        self.layers
            .iter()
            .find(|l| l.host == host)
            .map(|l| l.element)
    }

    /// Host owning the topmost layer
    pub fn top(&self) -> Option<NodeId> {
        self.layers.last().map(|l| l.host)
    }

    /// Create the overlay root lazily and keep it as the last body child
    fn ensure_root(&mut self, doc: &mut Document) -> NodeId {
        let body = doc.body();
        let root = match self.root {
            Some(root) => root,
            None => {
                let root = doc.create_element("div");
                doc.set_attr(root, "data-overlay-root", "");
                self.root = Some(root);
                root
            }
        };
        if doc.parent(root) != Some(body) || doc.next_sibling(root).is_some() {
            doc.append_child(body, root);
        }
        root
    }

    /// Open a layer owned by `host`, taking the page lock if it is the first
    ///
    /// Pushing a host that already has a layer returns the existing one.
    pub fn push(&mut self, doc: &mut Document, host: NodeId) -> NodeId {
        if let Some(existing) = self.layer_of(host) {
            return existing;
        }
        let root = self.ensure_root(doc);

        if self.lock.is_none() {
            self.lock = Some(Self::lock_page(doc, root));
        }

        let element = doc.create_element("div");
        doc.add_class(element, LAYER_CLASS);
        doc.set_owner(element, Some(host));
        doc.append_child(root, element);
        self.layers.push(Layer { host, element });
        self.restack(doc);

        tracing::debug!(host = host.index(), depth = self.layers.len(), "overlay layer opened");
        element
    }

    /// Close the layer owned by `host` from any stack position
    ///
    /// Returns the detached layer element. Releases the page lock when the
    /// last layer goes.
    pub fn pop(&mut self, doc: &mut Document, host: NodeId) -> Option<NodeId> {
        let index = self.layers.iter().position(|l| l.host == host)?;
        let layer = self.layers.remove(index);

        doc.remove(layer.element);
        doc.set_owner(layer.element, None);
        doc.remove_attr(layer.element, "inert");

        if self.layers.is_empty() {
            if let Some(lock) = self.lock.take() {
                Self::unlock_page(doc, lock);
            }
        } else {
            self.restack(doc);
        }

        tracing::debug!(host = host.index(), depth = self.layers.len(), "overlay layer closed");
        Some(layer.element)
    }

    fn lock_page(doc: &mut Document, root: NodeId) -> PageLock {
        let html = doc.root();
        let overflow = doc.style(html, "overflow").map(str::to_string);
        doc.set_style(html, "overflow", "hidden");

        let mut inerted = Vec::new();
        for child in doc.children(doc.body()).to_vec() {
            if child == root || !doc.is_element(child) || doc.has_attr(child, "inert") {
                continue;
            }
            doc.set_attr(child, "inert", "");
            inerted.push(child);
        }
        tracing::debug!(inerted = inerted.len(), "page locked");
        PageLock { overflow, inerted }
    }

    fn unlock_page(doc: &mut Document, lock: PageLock) {
        let html = doc.root();
        match lock.overflow {
            Some(previous) => doc.set_style(html, "overflow", &previous),
            None => {
                doc.remove_style(html, "overflow");
            }
        }
        for node in lock.inerted {
            doc.remove_attr(node, "inert");
        }
        tracing::debug!("page unlocked");
    }

    /// Only the topmost layer stays interactive
    fn restack(&self, doc: &mut Document) {
        let top = self.layers.len().saturating_sub(1);
        for (i, layer) in self.layers.iter().enumerate() {
            doc.toggle_attr(layer.element, "inert", i != top);
        }
    }
}
