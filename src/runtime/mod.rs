//! Component runtime
//!
//! Owns the document and every mounted component instance, and drives their
//! lifecycle the way a browser drives custom elements:
//!
//! ```text
//!  mount / set_attribute / key_down / click / pump
//!            │
//!            ▼
//!  Component callbacks (connected, attribute_changed, key_down, ...)
//!            │  cx.schedule_render()      (idempotent flag per instance)
//!            ▼
//!  Runtime::flush()                       (microtask checkpoint)
//!            │  take pending flags
//!            │  fetch markup + styles     (TemplateCache, coalesced)
//!            │  parse into a detached fragment
//!            │  Component::render(cx, fragment)
//!            │  swap fragment into the instance region
//!            ▼
//!  Component::rendered, then queued ticks
//! ```
//!
//! Components never see the runtime itself. Each callback receives a [`Cx`]
//! scoped to its instance: the document, its host and shadow root, the
//! render queue, the event sink, the mailbox and the overlay manager.
//!
//! Everything here runs on one task with `&mut` access. Asynchronous work
//! (debounced searches) is spawned onto tokio and reports back through the
//! mailbox, which [`Runtime::pump`] drains.

pub mod bind;
mod error;
mod scheduler;
mod template_cache;

pub use bind::bind;
pub use error::RuntimeError;
pub use scheduler::RenderQueue;
pub use template_cache::{
    HttpTemplateSource, StaticTemplates, TemplateCache, TemplateError, TemplateSource,
};

use crate::config::Config;
use crate::dom::{parse_fragment, Document, NodeId, Rect};
use crate::events::{EventName, EventSink, EventStream};
use crate::widgets::overlay::OverlayManager;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// Upper bound on render passes per flush, in case renders keep
/// rescheduling each other
const MAX_FLUSH_PASSES: usize = 16;

/// Result of handling an input event
///
/// Input is routed along the composed path of its target, innermost host
/// first, until one component returns `Handled::Yes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// Event was consumed by the component
    Yes,
    /// Event was not handled, keep routing
    No,
}

impl Handled {
    pub fn was_handled(self) -> bool {
        self == Self::Yes
    }
}

impl From<bool> for Handled {
    fn from(handled: bool) -> Self {
        if handled {
            Self::Yes
        } else {
            Self::No
        }
    }
}

/// Template locations for a component kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Templates {
    pub markup: String,
    pub styles: Option<String>,
}

impl Templates {
    /// Standard fragment-server layout: `/components/{kind}/{name}/{name}-markup`
    pub fn component(kind: &str, name: &str) -> Self {
        let base = format!("/components/{kind}/{name}/{name}");
        Self {
            markup: format!("{base}-markup"),
            styles: Some(format!("{base}-styles")),
        }
    }
}

/// Instance lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Unmounted,
    Mounted,
}

/// Behaviour of a custom element
///
/// Only `tag`, `templates` and the downcasting helpers are required; the
/// callbacks default to the base element behaviour (render on connect and on
/// any real attribute change, ignore input).
pub trait Component: Any + Send {
    fn tag(&self) -> &'static str;

    fn templates(&self) -> Templates;

    fn connected(&mut self, cx: &mut Cx<'_>) {
        cx.schedule_render();
    }

    fn disconnected(&mut self, _cx: &mut Cx<'_>) {}

    fn attribute_changed(
        &mut self,
        cx: &mut Cx<'_>,
        _name: &str,
        old: Option<&str>,
        new: Option<&str>,
    ) {
        if old != new {
            cx.schedule_render();
        }
    }

    /// Populate `content`, a detached fragment holding the parsed template.
    /// Returning an error discards the fragment and keeps the previous
    /// content on screen.
    fn render(&mut self, _cx: &mut Cx<'_>, _content: NodeId) -> Result<(), RuntimeError> {
        Ok(())
    }

    /// Called once the rendered content is in place
    fn rendered(&mut self, _cx: &mut Cx<'_>) {}

    /// Called after the flush that follows `Cx::request_tick`
    fn tick(&mut self, _cx: &mut Cx<'_>) {}

    fn key_down(&mut self, _cx: &mut Cx<'_>, _key: KeyEvent) -> Handled {
        Handled::No
    }

    fn click(&mut self, _cx: &mut Cx<'_>, _target: NodeId) -> Handled {
        Handled::No
    }

    /// Document-level pointer-down, delivered to every mounted instance
    fn pointer_down(&mut self, _cx: &mut Cx<'_>, _target: NodeId) {}

    fn viewport_changed(&mut self, _cx: &mut Cx<'_>) {}

    /// Asynchronous result posted through a [`Postman`]
    fn mail(&mut self, _cx: &mut Cx<'_>, _payload: Box<dyn Any + Send>) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Message addressed to a component instance
pub struct Mail {
    pub host: NodeId,
    pub payload: Box<dyn Any + Send>,
}

/// Cloneable, `Send` handle for posting results back to one instance
#[derive(Clone)]
pub struct Postman {
    host: NodeId,
    tx: mpsc::UnboundedSender<Mail>,
}

impl Postman {
    /// Returns false once the runtime has gone away
    pub fn post<T: Any + Send>(&self, payload: T) -> bool {
        self.tx
            .send(Mail {
                host: self.host,
                payload: Box::new(payload),
            })
            .is_ok()
    }
}

/// What a flush did
#[derive(Debug, Default)]
pub struct FlushReport {
    pub rendered: Vec<NodeId>,
    pub failed: Vec<(NodeId, RuntimeError)>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn render_count(&self, host: NodeId) -> usize {
        self.rendered.iter().filter(|h| **h == host).count()
    }
}

struct Instance {
    component: Option<Box<dyn Component>>,
    shadow: NodeId,
    region: NodeId,
    lifecycle: Lifecycle,
    renders: u64,
}

/// Per-callback view of the runtime, scoped to one instance
pub struct Cx<'a> {
    pub doc: &'a mut Document,
    pub overlay: &'a mut OverlayManager,
    host: NodeId,
    shadow: NodeId,
    region: NodeId,
    viewport: Rect,
    queue: &'a mut RenderQueue,
    ticks: &'a mut Vec<NodeId>,
    events: &'a EventSink,
    mail: &'a mpsc::UnboundedSender<Mail>,
}

impl<'a> Cx<'a> {
    pub fn host(&self) -> NodeId {
        self.host
    }

    pub fn shadow_root(&self) -> NodeId {
        self.shadow
    }

    /// Wrapper element holding the rendered content
    ///
    /// It normally lives in the shadow root; widgets that portal their
    /// content move this element and nothing else.
    pub fn region(&self) -> NodeId {
        self.region
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.doc.attr(self.host, name)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.doc.has_attr(self.host, name)
    }

    /// Reflect state onto the host without triggering `attribute_changed`
    pub fn reflect_attr(&mut self, name: &str, value: &str) {
        self.doc.set_attr(self.host, name, value);
    }

    pub fn schedule_render(&mut self) {
        if self.queue.schedule(self.host) {
            tracing::trace!(host = self.host.index(), "render scheduled");
        }
    }

    /// Run `Component::tick` after the current flush
    pub fn request_tick(&mut self) {
        if !self.ticks.contains(&self.host) {
            self.ticks.push(self.host);
        }
    }

    /// Emit a validated `domain:subject:action` event from the host
    pub fn dispatch_named_event(
        &self,
        name: &str,
        detail: impl Serialize,
    ) -> Result<EventName, RuntimeError> {
        self.events.dispatch(&*self.doc, self.host, name, detail)
    }

    pub fn postman(&self) -> Postman {
        Postman {
            host: self.host,
            tx: self.mail.clone(),
        }
    }

    /// Required encapsulated element; missing ones fail the render
    pub fn require(&self, root: NodeId, selector: &str) -> Result<NodeId, RuntimeError> {
        self.doc
            .query(root, selector)
            .ok_or_else(|| RuntimeError::MissingElement {
                tag: self.doc.tag(self.host).unwrap_or_default().to_string(),
                selector: selector.to_string(),
            })
    }
}

/// The component runtime
pub struct Runtime {
    doc: Document,
    cache: TemplateCache,
    queue: RenderQueue,
    ticks: Vec<NodeId>,
    events: EventSink,
    mail_tx: mpsc::UnboundedSender<Mail>,
    mail_rx: mpsc::UnboundedReceiver<Mail>,
    overlay: OverlayManager,
    instances: BTreeMap<NodeId, Instance>,
    viewport: Rect,
}

impl Runtime {
    /// Create a runtime and the stream its components' events arrive on
    pub fn new(cache: TemplateCache) -> (Self, EventStream) {
        let (events, stream) = EventSink::channel();
        let (mail_tx, mail_rx) = mpsc::unbounded_channel();
        let runtime = Self {
            doc: Document::new(),
            cache,
            queue: RenderQueue::new(),
            ticks: Vec::new(),
            events,
            mail_tx,
            mail_rx,
            overlay: OverlayManager::new(),
            instances: BTreeMap::new(),
            viewport: Rect::new(0.0, 0.0, 1280.0, 800.0),
        };
        (runtime, stream)
    }

    /// Runtime fetching templates over HTTP from `config.origin`
    pub fn from_config(config: &Config) -> anyhow::Result<(Self, EventStream)> {
        let source = HttpTemplateSource::new(&config.origin)?;
        Ok(Self::new(TemplateCache::new(source)))
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn doc_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn overlay(&self) -> &OverlayManager {
        &self.overlay
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    pub fn lifecycle(&self, host: NodeId) -> Option<Lifecycle> {
        self.instances.get(&host).map(|i| i.lifecycle)
    }

    /// Number of completed renders of `host`
    pub fn render_count(&self, host: NodeId) -> u64 {
        self.instances.get(&host).map_or(0, |i| i.renders)
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.instances.get(&host).map(|i| i.shadow)
    }

    pub fn region(&self, host: NodeId) -> Option<NodeId> {
        self.instances.get(&host).map(|i| i.region)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a host element for `component` without connecting it
    ///
    /// Attributes and light children can be added before [`Runtime::connect`],
    /// the way a parser builds an element before inserting it.
    pub fn create(&mut self, component: impl Component) -> NodeId {
        let host = self.doc.create_element(component.tag());
        let shadow = self.doc.attach_shadow(host);
        let region = self.doc.create_element("div");
        self.doc.set_attr(region, "data-part", "root");
        self.doc.append_child(shadow, region);
        self.instances.insert(
            host,
            Instance {
                component: Some(Box::new(component)),
                shadow,
                region,
                lifecycle: Lifecycle::Unmounted,
                renders: 0,
            },
        );
        host
    }

    /// Insert `host` under `parent` and run its `connected` callback
    ///
    /// Unmounted instances nested inside `host` are connected with it,
    /// outermost first.
    pub fn connect(&mut self, parent: NodeId, host: NodeId) -> Result<(), RuntimeError> {
        if !self.instances.contains_key(&host) {
            return Err(RuntimeError::UnknownInstance(host.index()));
        }
        self.doc.append_child(parent, host);
        if !self.doc.is_connected(host) {
            return Ok(());
        }

        let mut arrived: Vec<(usize, NodeId)> = self
            .instances
            .iter()
            .filter(|(h, i)| i.lifecycle == Lifecycle::Unmounted && self.doc.contains(host, **h))
            .map(|(h, _)| (self.doc.event_path(*h).len(), *h))
            .collect();
        arrived.sort();

        for (_, h) in arrived {
            if let Some(instance) = self.instances.get_mut(&h) {
                instance.lifecycle = Lifecycle::Mounted;
            }
            tracing::debug!(host = h.index(), tag = ?self.doc.tag(h), "connected");
            self.with_instance(h, |component, cx| component.connected(cx));
        }
        Ok(())
    }

    /// `create` + `connect` with initial attributes
    pub fn mount(
        &mut self,
        parent: NodeId,
        component: impl Component,
        attrs: &[(&str, &str)],
    ) -> NodeId {
        let host = self.create(component);
        for (name, value) in attrs {
            self.doc.set_attr(host, name, *value);
        }
        // Host was just created, so connect cannot miss it
        let _ = self.connect(parent, host);
        host
    }

    /// Remove `host` from the document and run its `disconnected` callback
    ///
    /// Instances nested inside `host` are disconnected with it.
    pub fn disconnect(&mut self, host: NodeId) -> Result<(), RuntimeError> {
        if !self.instances.contains_key(&host) {
            return Err(RuntimeError::UnknownInstance(host.index()));
        }
        self.remove(host);
        Ok(())
    }

    /// Detach `node` and disconnect every instance that left the document
    /// with it
    pub fn remove(&mut self, node: NodeId) {
        self.doc.remove(node);
        self.sweep_disconnected();
    }

    /// Like [`Runtime::remove`], then reclaim the subtree and drop the
    /// instances hosted in it
    pub fn discard(&mut self, node: NodeId) {
        self.remove(node);
        self.doc.discard(node);
        self.sweep_disconnected();
    }

    /// Unmount every mounted instance whose host is no longer connected
    ///
    /// Catches removals made through [`Runtime::doc_mut`] as well; input
    /// routing, mail delivery and flushes sweep before they run.
    fn sweep_disconnected(&mut self) {
        let gone: Vec<NodeId> = self
            .instances
            .iter()
            .filter(|(host, i)| {
                i.lifecycle == Lifecycle::Mounted && !self.doc.is_connected(**host)
            })
            .map(|(host, _)| *host)
            .collect();

        for host in &gone {
            if let Some(instance) = self.instances.get_mut(host) {
                instance.lifecycle = Lifecycle::Unmounted;
            }
            self.queue.cancel(*host);
            self.ticks.retain(|h| h != host);
        }
        for host in gone {
            tracing::debug!(host = host.index(), "disconnected");
            self.with_instance(host, |component, cx| component.disconnected(cx));
        }

        let doc = &self.doc;
        self.instances.retain(|host, _| doc.is_live(*host));
    }

    /// Set a host attribute, notifying the instance when mounted
    pub fn set_attribute(&mut self, host: NodeId, name: &str, value: &str) {
        let old = self.doc.set_attr(host, name, value);
        self.notify_attribute(host, name, old, Some(value.to_string()));
    }

    pub fn remove_attribute(&mut self, host: NodeId, name: &str) {
        let old = self.doc.remove_attr(host, name);
        self.notify_attribute(host, name, old, None);
    }

    fn notify_attribute(
        &mut self,
        host: NodeId,
        name: &str,
        old: Option<String>,
        new: Option<String>,
    ) {
        if self.lifecycle(host) != Some(Lifecycle::Mounted) {
            return;
        }
        self.with_instance(host, |component, cx| {
            component.attribute_changed(cx, name, old.as_deref(), new.as_deref())
        });
    }

    /// Run `f` against the instance on `host`
    fn with_instance<R>(
        &mut self,
        host: NodeId,
        f: impl FnOnce(&mut dyn Component, &mut Cx<'_>) -> R,
    ) -> Option<R> {
        let instance = self.instances.get_mut(&host)?;
        // Taken out for the duration of the callback so the Cx can borrow the
        // rest of the runtime
        let mut component = instance.component.take()?;
        let (shadow, region) = (instance.shadow, instance.region);

        let mut cx = Cx {
            doc: &mut self.doc,
            overlay: &mut self.overlay,
            host,
            shadow,
            region,
            viewport: self.viewport,
            queue: &mut self.queue,
            ticks: &mut self.ticks,
            events: &self.events,
            mail: &self.mail_tx,
        };
        let out = f(component.as_mut(), &mut cx);

        if let Some(instance) = self.instances.get_mut(&host) {
            instance.component = Some(component);
        }
        Some(out)
    }

    /// Typed access to the component on `host`, e.g. for public widget APIs
    pub fn with<T: Component, R>(
        &mut self,
        host: NodeId,
        f: impl FnOnce(&mut T, &mut Cx<'_>) -> R,
    ) -> Option<R> {
        self.with_instance(host, |component, cx| {
            component.as_any_mut().downcast_mut::<T>().map(|c| f(c, cx))
        })
        .flatten()
    }

    /// Read-only typed access
    pub fn component<T: Component>(&self, host: NodeId) -> Option<&T> {
        self.instances
            .get(&host)?
            .component
            .as_ref()?
            .as_any()
            .downcast_ref::<T>()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rendering
    // ─────────────────────────────────────────────────────────────────────────

    /// Microtask checkpoint: run every pending render, then pending ticks
    pub async fn flush(&mut self) -> FlushReport {
        self.sweep_disconnected();
        let mut report = FlushReport::default();

        for _ in 0..MAX_FLUSH_PASSES {
            let pending = self.queue.take();
            let ticks = std::mem::take(&mut self.ticks);
            if pending.is_empty() && ticks.is_empty() {
                return report;
            }

            for host in pending {
                match self.render_instance(host).await {
                    Ok(true) => report.rendered.push(host),
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(host = host.index(), error = %e, "render failed");
                        report.failed.push((host, e));
                    }
                }
            }

            for host in ticks {
                self.with_instance(host, |component, cx| component.tick(cx));
            }
        }

        tracing::warn!("flush stopped after {MAX_FLUSH_PASSES} passes");
        report
    }

    /// Returns Ok(false) when the instance is no longer mounted
    async fn render_instance(&mut self, host: NodeId) -> Result<bool, RuntimeError> {
        let instance = self
            .instances
            .get(&host)
            .ok_or(RuntimeError::UnknownInstance(host.index()))?;
        if instance.lifecycle != Lifecycle::Mounted {
            return Ok(false);
        }
        let templates = instance
            .component
            .as_ref()
            .map(|c| c.templates())
            .ok_or(RuntimeError::UnknownInstance(host.index()))?;
        let region = instance.region;

        let cache = self.cache.clone();
        let (markup, styles) = tokio::join!(cache.fetch(&templates.markup), async {
            match &templates.styles {
                Some(url) => cache.fetch(url).await.map(Some),
                None => Ok(None),
            }
        });
        let markup = markup?;
        let styles = styles?;

        // Detached until complete
        let content = parse_fragment(&mut self.doc, &markup)?;
        if let Some(css) = styles.filter(|css| !css.trim().is_empty()) {
            let style = self.doc.create_element("style");
            let text = self.doc.create_text(&*css);
            self.doc.append_child(style, text);
            let first = self.doc.children(content).first().copied();
            self.doc.insert_before(content, style, first);
        }

        let outcome = self
            .with_instance(host, |component, cx| component.render(cx, content))
            .ok_or(RuntimeError::UnknownInstance(host.index()));
        if !matches!(outcome, Ok(Ok(()))) {
            self.doc.discard(content);
        }
        outcome??;

        self.doc.clear_children(region);
        self.doc.move_children(content, region);
        self.doc.discard(content);
        if let Some(instance) = self.instances.get_mut(&host) {
            instance.renders += 1;
        }
        tracing::debug!(host = host.index(), "rendered");

        self.with_instance(host, |component, cx| component.rendered(cx));
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Input
    // ─────────────────────────────────────────────────────────────────────────

    /// Component hosts on the composed path of `target`, innermost first
    fn hosts_on_path(&self, target: NodeId) -> Vec<NodeId> {
        self.doc
            .event_path(target)
            .into_iter()
            .filter(|n| self.lifecycle(*n) == Some(Lifecycle::Mounted))
            .collect()
    }

    /// Route a key press from the focused element outwards
    ///
    /// Unhandled Tab / Shift+Tab falls back to sequential focus navigation.
    pub fn key_down(&mut self, key: KeyEvent) -> Handled {
        self.sweep_disconnected();
        let target = self.doc.active_element().unwrap_or(self.doc.body());
        for host in self.hosts_on_path(target) {
            let handled = self
                .with_instance(host, |component, cx| component.key_down(cx, key))
                .unwrap_or(Handled::No);
            if handled.was_handled() {
                return Handled::Yes;
            }
        }

        match key.code {
            KeyCode::Tab if key.modifiers.contains(KeyModifiers::SHIFT) => {
                self.move_focus(false)
            }
            KeyCode::Tab => self.move_focus(true),
            KeyCode::BackTab => self.move_focus(false),
            _ => Handled::No,
        }
    }

    /// Feed `text` as a sequence of character key presses
    pub fn type_text(&mut self, text: &str) {
        for c in text.chars() {
            self.key_down(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
    }

    fn move_focus(&mut self, forward: bool) -> Handled {
        let order = self.doc.tab_order();
        if order.is_empty() {
            return Handled::No;
        }
        let current = self
            .doc
            .active_element()
            .and_then(|a| order.iter().position(|n| *n == a));
        let next = match (current, forward) {
            (None, true) => 0,
            (None, false) => order.len() - 1,
            (Some(i), true) => (i + 1) % order.len(),
            (Some(i), false) => (i + order.len() - 1) % order.len(),
        };
        self.doc.focus(order[next]);
        Handled::Yes
    }

    /// Route a click on `target` through the hosts on its path
    pub fn click(&mut self, target: NodeId) -> Handled {
        self.sweep_disconnected();
        if self.doc.is_inert(target) {
            return Handled::No;
        }
        if self.doc.is_focusable(target) {
            self.doc.focus(target);
        }
        for host in self.hosts_on_path(target) {
            let handled = self
                .with_instance(host, |component, cx| component.click(cx, target))
                .unwrap_or(Handled::No);
            if handled.was_handled() {
                return Handled::Yes;
            }
        }
        Handled::No
    }

    /// Document-level pointer-down, broadcast to every mounted instance
    pub fn pointer_down(&mut self, target: NodeId) {
        self.sweep_disconnected();
        let hosts: Vec<NodeId> = self
            .instances
            .iter()
            .filter(|(_, i)| i.lifecycle == Lifecycle::Mounted)
            .map(|(h, _)| *h)
            .collect();
        for host in hosts {
            self.with_instance(host, |component, cx| component.pointer_down(cx, target));
        }
    }

    /// Viewport resized or scrolled
    pub fn viewport_changed(&mut self, viewport: Rect) {
        self.viewport = viewport;
        self.sweep_disconnected();
        let hosts: Vec<NodeId> = self
            .instances
            .iter()
            .filter(|(_, i)| i.lifecycle == Lifecycle::Mounted)
            .map(|(h, _)| *h)
            .collect();
        for host in hosts {
            self.with_instance(host, |component, cx| component.viewport_changed(cx));
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mail
    // ─────────────────────────────────────────────────────────────────────────

    fn deliver(&mut self, mail: Mail) {
        self.sweep_disconnected();
        let Mail { host, payload } = mail;
        if self.lifecycle(host) != Some(Lifecycle::Mounted) {
            tracing::debug!(host = host.index(), "dropping mail for unmounted instance");
            return;
        }
        self.with_instance(host, |component, cx| component.mail(cx, payload));
    }

    /// Wait for the next mail item, deliver it and flush
    pub async fn pump(&mut self) -> FlushReport {
        if let Some(mail) = self.mail_rx.recv().await {
            self.deliver(mail);
        }
        self.flush().await
    }

    /// Deliver everything already queued without waiting, then flush
    pub async fn drain(&mut self) -> FlushReport {
        while let Ok(mail) = self.mail_rx.try_recv() {
            self.deliver(mail);
        }
        self.flush().await
    }
}
