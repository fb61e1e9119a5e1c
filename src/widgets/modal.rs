//! `<app-modal>` - dialog with portaling, focus trap and page lock
//!
//! State is carried by two flags:
//!
//! ```text
//!            open attr set                 tick
//!   closed ───────────────▶ opening ─────────────▶ open
//!     ▲      (portaled, opening)      (portaled)     │
//!     └──────────────────────────────────────────────┘
//!                      open attr removed
//! ```
//!
//! Opening moves the instance region (backdrop + dialog) into an overlay
//! layer owned by the host. The host element itself never moves, so its
//! place among its siblings is kept by construction and light children stay
//! slotted into the dialog.

use crate::dom::NodeId;
use crate::events::{names, ModalDetail};
use crate::runtime::{Component, Cx, Handled, RuntimeError, Templates};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::any::Any;

/// Observed host attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalAttr {
    Open,
    Name,
    EscClose,
    AriaLabel,
}

impl ModalAttr {
    pub const ALL: [ModalAttr; 4] = [Self::Open, Self::Name, Self::EscClose, Self::AriaLabel];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Name => "name",
            Self::EscClose => "esc-close",
            Self::AriaLabel => "aria-label",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == name)
    }
}

#[derive(Debug, Default)]
pub struct Modal {
    /// Region currently lives in an overlay layer
    portaled: bool,
    /// Set while an open is in progress; cleared on the next tick
    opening: bool,
    /// First render has completed
    mounted: bool,
    dialog: Option<NodeId>,
    backdrop: Option<NodeId>,
    previous_focus: Option<NodeId>,
}

impl Modal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.portaled
    }

    pub fn is_portaled(&self) -> bool {
        self.portaled
    }

    pub fn open_modal(&mut self, cx: &mut Cx<'_>) {
        self.set_open(cx, true);
    }

    pub fn close_modal(&mut self, cx: &mut Cx<'_>) {
        self.set_open(cx, false);
    }

    pub fn toggle(&mut self, cx: &mut Cx<'_>) {
        let open = cx.has_attr(ModalAttr::Open.as_str());
        self.set_open(cx, !open);
    }

    /// Mirror of setting the `open` property: flips the attribute and runs
    /// the same handler the attribute observer would
    fn set_open(&mut self, cx: &mut Cx<'_>, open: bool) {
        let host = cx.host();
        if cx.doc.toggle_attr(host, ModalAttr::Open.as_str(), open) {
            self.open_changed(cx);
        }
    }

    fn open_changed(&mut self, cx: &mut Cx<'_>) {
        // Portaling mid-mount would move a region that is about to be replaced
        if !self.mounted {
            return;
        }
        if cx.has_attr(ModalAttr::Open.as_str()) {
            self.handle_open(cx);
        } else {
            self.handle_close(cx);
        }
    }

    fn name(cx: &Cx<'_>) -> String {
        cx.attr(ModalAttr::Name.as_str()).unwrap_or_default().to_string()
    }

    fn handle_open(&mut self, cx: &mut Cx<'_>) {
        if self.portaled || self.opening {
            return;
        }
        self.opening = true;
        self.previous_focus = cx.doc.active_element();

        let host = cx.host();
        let region = cx.region();
        let layer = cx.overlay.push(cx.doc, host);
        cx.doc.append_child(layer, region);
        self.portaled = true;

        self.focus_first(cx);
        let name = Self::name(cx);
        if let Err(e) = cx.dispatch_named_event(names::MODAL_OPENED, ModalDetail { name }) {
            tracing::error!(error = %e, "modal open notification rejected");
        }
        self.reflect_a11y(cx);
        cx.request_tick();
        tracing::debug!(host = host.index(), "modal opened");
    }

    fn handle_close(&mut self, cx: &mut Cx<'_>) {
        if !self.portaled && !self.opening {
            return;
        }
        let host = cx.host();
        let layer = cx.overlay.pop(cx.doc, host);
        let (shadow, region) = (cx.shadow_root(), cx.region());
        cx.doc.append_child(shadow, region);
        if let Some(layer) = layer {
            cx.doc.discard(layer);
        }

        if let Some(previous) = self.previous_focus.take() {
            cx.doc.focus(previous);
        }
        self.portaled = false;

        let name = Self::name(cx);
        if let Err(e) = cx.dispatch_named_event(names::MODAL_CLOSED, ModalDetail { name }) {
            tracing::error!(error = %e, "modal close notification rejected");
        }
        self.reflect_a11y(cx);
        tracing::debug!(host = host.index(), "modal closed");
    }

    fn reflect_a11y(&self, cx: &mut Cx<'_>) {
        let hidden = if cx.has_attr(ModalAttr::Open.as_str()) {
            "false"
        } else {
            "true"
        };
        for node in [self.backdrop, self.dialog].into_iter().flatten() {
            cx.doc.set_attr(node, "aria-hidden", hidden);
        }
    }

    fn reflect_label(&self, cx: &mut Cx<'_>) {
        let Some(dialog) = self.dialog else {
            return;
        };
        match cx.attr(ModalAttr::AriaLabel.as_str()).map(str::to_string) {
            Some(label) => {
                cx.doc.set_attr(dialog, "aria-label", label);
            }
            None => {
                cx.doc.remove_attr(dialog, "aria-label");
            }
        }
    }

    fn focusables(&self, cx: &Cx<'_>) -> Vec<NodeId> {
        self.dialog
            .map(|dialog| cx.doc.focusables_within(dialog))
            .unwrap_or_default()
    }

    fn focus_first(&self, cx: &mut Cx<'_>) {
        let target = self.focusables(cx).first().copied().or(self.dialog);
        if let Some(target) = target {
            cx.doc.focus(target);
        }
    }

    /// Keep Tab / Shift+Tab cycling inside the dialog
    fn trap_tab(&self, cx: &mut Cx<'_>, backwards: bool) {
        let items = self.focusables(cx);
        let (Some(first), Some(last)) = (items.first().copied(), items.last().copied()) else {
            if let Some(dialog) = self.dialog {
                cx.doc.focus(dialog);
            }
            return;
        };
        let current = cx
            .doc
            .active_element()
            .and_then(|active| items.iter().position(|n| *n == active));
        let target = match (current, backwards) {
            (Some(i), false) if i + 1 < items.len() => items[i + 1],
            (Some(i), true) if i > 0 => items[i - 1],
            (_, false) => first,
            (_, true) => last,
        };
        cx.doc.focus(target);
    }
}

impl Component for Modal {
    fn tag(&self) -> &'static str {
        "app-modal"
    }

    fn templates(&self) -> Templates {
        Templates::component("atoms", "modal")
    }

    fn attribute_changed(
        &mut self,
        cx: &mut Cx<'_>,
        name: &str,
        old: Option<&str>,
        new: Option<&str>,
    ) {
        if old == new {
            return;
        }
        // No re-render on attribute changes: open/close only moves the region
        match ModalAttr::parse(name) {
            Some(ModalAttr::Open) => self.open_changed(cx),
            Some(ModalAttr::AriaLabel) => self.reflect_label(cx),
            Some(ModalAttr::Name) | Some(ModalAttr::EscClose) | None => {}
        }
    }

    fn render(&mut self, cx: &mut Cx<'_>, content: NodeId) -> Result<(), RuntimeError> {
        let dialog = cx.require(content, ".dialog")?;
        self.dialog = Some(dialog);
        self.backdrop = cx.doc.query(content, ".backdrop");
        Ok(())
    }

    fn rendered(&mut self, cx: &mut Cx<'_>) {
        self.mounted = true;
        self.reflect_label(cx);
        // Born with [open], or opened before the first render finished
        if cx.has_attr(ModalAttr::Open.as_str()) && !self.portaled {
            self.handle_open(cx);
        }
        self.reflect_a11y(cx);
    }

    fn tick(&mut self, _cx: &mut Cx<'_>) {
        self.opening = false;
    }

    fn disconnected(&mut self, cx: &mut Cx<'_>) {
        if !self.portaled {
            return;
        }
        // Leave the page usable; the open attribute stays so a reconnect
        // reopens the dialog
        let host = cx.host();
        let layer = cx.overlay.pop(cx.doc, host);
        let (shadow, region) = (cx.shadow_root(), cx.region());
        cx.doc.append_child(shadow, region);
        if let Some(layer) = layer {
            cx.doc.discard(layer);
        }
        self.portaled = false;
        self.opening = false;
        self.previous_focus = None;
        tracing::debug!(host = host.index(), "modal disconnected while open");
    }

    fn key_down(&mut self, cx: &mut Cx<'_>, key: KeyEvent) -> Handled {
        if !cx.has_attr(ModalAttr::Open.as_str()) {
            return Handled::No;
        }
        match key.code {
            KeyCode::Esc if cx.has_attr(ModalAttr::EscClose.as_str()) => {
                self.close_modal(cx);
                Handled::Yes
            }
            KeyCode::Tab => {
                self.trap_tab(cx, key.modifiers.contains(KeyModifiers::SHIFT));
                Handled::Yes
            }
            KeyCode::BackTab => {
                self.trap_tab(cx, true);
                Handled::Yes
            }
            _ => Handled::No,
        }
    }

    fn click(&mut self, cx: &mut Cx<'_>, target: NodeId) -> Handled {
        // Backdrop swallows clicks and never closes
        match self.backdrop {
            Some(backdrop) if cx.doc.contains(backdrop, target) => Handled::Yes,
            _ => Handled::No,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ComponentEvent, EventStream};
    use crate::runtime::{Lifecycle, Runtime, StaticTemplates, TemplateCache};

    const MARKUP: &str = r#"
        <div class="backdrop" aria-hidden="true"></div>
        <div class="dialog" role="dialog" aria-modal="true" tabindex="-1">
            <span class="focus-sentinel" tabindex="0"></span>
            <button class="close">Luk</button>
            <slot></slot>
            <span class="focus-sentinel" tabindex="0"></span>
        </div>
    "#;

    fn runtime() -> (Runtime, EventStream) {
        runtime_with(MARKUP)
    }

    fn runtime_with(markup: &str) -> (Runtime, EventStream) {
        let templates = StaticTemplates::new()
            .with("/components/atoms/modal/modal-markup", markup)
            .with("/components/atoms/modal/modal-styles", ".dialog { margin: auto }");
        Runtime::new(TemplateCache::new(templates))
    }

    fn drain(events: &mut EventStream) -> Vec<ComponentEvent> {
        std::iter::from_fn(|| events.try_recv().ok()).collect()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    /// Page with `before` and `after` siblings around where the modal goes
    struct Page {
        rt: Runtime,
        events: EventStream,
        main: NodeId,
        trigger: NodeId,
    }

    fn page() -> Page {
        let (mut rt, events) = runtime();
        let doc = rt.doc_mut();
        let body = doc.body();
        let main = doc.create_element("main");
        let trigger = doc.create_element("button");
        doc.append_child(body, main);
        doc.append_child(main, trigger);
        doc.focus(trigger);
        Page {
            rt,
            events,
            main,
            trigger,
        }
    }

    async fn round_trip_keeps_position(before: usize, after: usize) {
        let mut p = page();
        let container = p.rt.doc_mut().create_element("section");
        let main = p.main;
        p.rt.doc_mut().append_child(main, container);
        for _ in 0..before {
            let sibling = p.rt.doc_mut().create_element("p");
            p.rt.doc_mut().append_child(container, sibling);
        }
        let host = p.rt.mount(container, Modal::new(), &[("name", "confirm")]);
        for _ in 0..after {
            let sibling = p.rt.doc_mut().create_element("p");
            p.rt.doc_mut().append_child(container, sibling);
        }
        assert!(p.rt.flush().await.is_clean());

        let index = p.rt.doc().index_in_parent(host);
        p.rt.set_attribute(host, "open", "");
        p.rt.flush().await;
        assert!(p.rt.component::<Modal>(host).unwrap().is_portaled());
        assert_eq!(p.rt.doc().parent(host), Some(container));

        p.rt.remove_attribute(host, "open");
        p.rt.flush().await;
        assert_eq!(p.rt.doc().parent(host), Some(container));
        assert_eq!(p.rt.doc().index_in_parent(host), index);
        assert_eq!(p.rt.doc().active_element(), Some(p.trigger));
    }

    #[tokio::test]
    async fn test_round_trip_as_only_child() {
        round_trip_keeps_position(0, 0).await;
    }

    #[tokio::test]
    async fn test_round_trip_as_last_child() {
        round_trip_keeps_position(2, 0).await;
    }

    #[tokio::test]
    async fn test_round_trip_between_siblings() {
        round_trip_keeps_position(1, 2).await;
    }

    #[tokio::test]
    async fn test_open_portals_locks_and_focuses() {
        let mut p = page();
        let main = p.main;
        let host = p.rt.mount(main, Modal::new(), &[("name", "confirm"), ("aria-label", "Bekræft")]);
        p.rt.flush().await;

        p.rt.set_attribute(host, "open", "");
        p.rt.flush().await;

        let doc = p.rt.doc();
        let region = p.rt.region(host).unwrap();
        let overlay_root = p.rt.overlay().root().unwrap();
        assert_eq!(doc.parent(doc.parent(region).unwrap()), Some(overlay_root));
        assert_eq!(doc.style(doc.root(), "overflow"), Some("hidden"));
        assert!(doc.has_attr(main, "inert"));

        let close = doc.query(region, ".close").unwrap();
        assert_eq!(doc.active_element(), Some(close));
        let dialog = doc.query(region, ".dialog").unwrap();
        assert_eq!(doc.attr(dialog, "aria-hidden"), Some("false"));
        assert_eq!(doc.attr(dialog, "aria-label"), Some("Bekræft"));

        let events = drain(&mut p.events);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name.as_str(), "modal:dialog:opened");
        assert_eq!(
            events[0].detail_as::<ModalDetail>(),
            Some(ModalDetail { name: "confirm".into() })
        );
        // Raised from the host, so the page still hears it
        assert!(events[0].reaches(main));

        p.rt.with::<Modal, _>(host, |modal, cx| modal.close_modal(cx));
        let doc = p.rt.doc();
        assert_eq!(doc.parent(region), p.rt.shadow_root(host));
        assert_eq!(doc.style(doc.root(), "overflow"), None);
        assert!(!doc.has_attr(main, "inert"));
        assert_eq!(doc.attr(dialog, "aria-hidden"), Some("true"));
        let events = drain(&mut p.events);
        assert_eq!(events[0].name.as_str(), "modal:dialog:closed");
    }

    #[tokio::test]
    async fn test_open_before_first_render_is_deferred() {
        let mut p = page();
        let main = p.main;
        let host = p.rt.mount(main, Modal::new(), &[("open", "")]);
        assert!(!p.rt.component::<Modal>(host).unwrap().is_portaled());

        p.rt.flush().await;
        assert!(p.rt.component::<Modal>(host).unwrap().is_open());
        assert_eq!(drain(&mut p.events).len(), 1);
    }

    #[tokio::test]
    async fn test_reentrant_open_is_ignored() {
        let mut p = page();
        let main = p.main;
        let host = p.rt.mount(main, Modal::new(), &[]);
        p.rt.flush().await;

        p.rt.with::<Modal, _>(host, |modal, cx| {
            modal.open_modal(cx);
            modal.handle_open(cx);
        });
        p.rt.flush().await;
        assert_eq!(drain(&mut p.events).len(), 1);
        assert_eq!(p.rt.overlay().depth(), 1);

        // Closing twice only notifies once
        p.rt.with::<Modal, _>(host, |modal, cx| {
            modal.close_modal(cx);
            modal.handle_close(cx);
        });
        assert_eq!(drain(&mut p.events).len(), 1);
    }

    #[tokio::test]
    async fn test_tab_wraps_inside_dialog_including_slotted_content() {
        let mut p = page();
        let main = p.main;
        let host = p.rt.create(Modal::new());
        let field = p.rt.doc_mut().create_element("input");
        p.rt.doc_mut().append_child(host, field);
        p.rt.connect(main, host).unwrap();
        p.rt.flush().await;

        p.rt.set_attribute(host, "open", "");
        p.rt.flush().await;
        let region = p.rt.region(host).unwrap();
        let close = p.rt.doc().query(region, ".close").unwrap();
        assert_eq!(p.rt.doc().active_element(), Some(close));

        p.rt.key_down(key(KeyCode::Tab));
        assert_eq!(p.rt.doc().active_element(), Some(field));
        p.rt.key_down(key(KeyCode::Tab));
        assert_eq!(p.rt.doc().active_element(), Some(close));
        p.rt.key_down(KeyEvent::new(KeyCode::BackTab, KeyModifiers::SHIFT));
        assert_eq!(p.rt.doc().active_element(), Some(field));

        // The background trigger cannot take focus while locked
        let trigger = p.trigger;
        assert!(!p.rt.doc_mut().focus(trigger));
    }

    #[tokio::test]
    async fn test_escape_requires_esc_close() {
        let mut p = page();
        let main = p.main;
        let host = p.rt.mount(main, Modal::new(), &[("open", "")]);
        p.rt.flush().await;

        assert_eq!(p.rt.key_down(key(KeyCode::Esc)), Handled::No);
        assert!(p.rt.component::<Modal>(host).unwrap().is_open());

        p.rt.set_attribute(host, "esc-close", "");
        assert_eq!(p.rt.key_down(key(KeyCode::Esc)), Handled::Yes);
        assert!(!p.rt.component::<Modal>(host).unwrap().is_open());
        assert!(!p.rt.doc().has_attr(host, "open"));
    }

    #[tokio::test]
    async fn test_backdrop_click_does_not_close() {
        let mut p = page();
        let main = p.main;
        let host = p.rt.mount(main, Modal::new(), &[("open", "")]);
        p.rt.flush().await;

        let backdrop = p.rt.doc().query(p.rt.region(host).unwrap(), ".backdrop").unwrap();
        assert_eq!(p.rt.click(backdrop), Handled::Yes);
        assert!(p.rt.component::<Modal>(host).unwrap().is_open());
    }

    #[tokio::test]
    async fn test_disconnect_while_open_releases_page() {
        let mut p = page();
        let main = p.main;
        let host = p.rt.mount(main, Modal::new(), &[("open", "")]);
        p.rt.flush().await;
        assert!(p.rt.overlay().is_locked());

        p.rt.disconnect(host).unwrap();
        let doc = p.rt.doc();
        assert!(!p.rt.overlay().is_locked());
        assert!(!doc.has_attr(main, "inert"));
        assert_eq!(doc.style(doc.root(), "overflow"), None);
        assert_eq!(p.rt.overlay().depth(), 0);
    }

    #[tokio::test]
    async fn test_disconnecting_outer_modal_releases_open_inner_modal() {
        let mut p = page();
        let main = p.main;
        let outer = p.rt.mount(main, Modal::new(), &[("name", "outer")]);
        let inner = p.rt.mount(outer, Modal::new(), &[("name", "inner")]);
        p.rt.flush().await;

        p.rt.set_attribute(inner, "open", "");
        p.rt.flush().await;
        assert!(p.rt.component::<Modal>(inner).unwrap().is_portaled());
        assert!(p.rt.doc().has_attr(main, "inert"));

        p.rt.disconnect(outer).unwrap();
        let doc = p.rt.doc();
        assert_eq!(p.rt.lifecycle(outer), Some(Lifecycle::Unmounted));
        assert_eq!(p.rt.lifecycle(inner), Some(Lifecycle::Unmounted));
        assert!(!p.rt.component::<Modal>(inner).unwrap().is_portaled());
        assert!(!p.rt.overlay().is_locked());
        assert_eq!(p.rt.overlay().depth(), 0);
        assert!(!doc.has_attr(main, "inert"));
        assert_eq!(doc.style(doc.root(), "overflow"), None);

        // Reconnecting the outer modal brings the inner one back open
        p.rt.connect(main, outer).unwrap();
        p.rt.flush().await;
        assert_eq!(p.rt.lifecycle(inner), Some(Lifecycle::Mounted));
    }

    #[tokio::test]
    async fn test_removal_through_document_is_noticed() {
        let mut p = page();
        let main = p.main;
        let section = p.rt.doc_mut().create_element("section");
        p.rt.doc_mut().append_child(main, section);
        let host = p.rt.mount(section, Modal::new(), &[("open", "")]);
        p.rt.flush().await;
        assert!(p.rt.overlay().is_locked());

        p.rt.doc_mut().discard(section);
        p.rt.flush().await;
        assert!(!p.rt.overlay().is_locked());
        assert!(!p.rt.doc().has_attr(main, "inert"));
        assert_eq!(p.rt.lifecycle(host), None);
        assert!(!p.rt.doc().is_live(host));
    }

    #[tokio::test]
    async fn test_tab_stays_on_dialog_without_focusable_content() {
        let (mut rt, _events) = runtime_with(
            r#"<div class="dialog" role="dialog" tabindex="-1">
                <span class="focus-sentinel" tabindex="0"></span>
                <span class="focus-sentinel" tabindex="0"></span>
            </div>"#,
        );
        let body = rt.doc().body();
        let host = rt.mount(body, Modal::new(), &[("open", "")]);
        rt.flush().await;

        let dialog = rt.doc().query(rt.region(host).unwrap(), ".dialog").unwrap();
        assert_eq!(rt.doc().active_element(), Some(dialog));

        assert_eq!(rt.key_down(key(KeyCode::Tab)), Handled::Yes);
        assert_eq!(rt.doc().active_element(), Some(dialog));
        assert_eq!(
            rt.key_down(KeyEvent::new(KeyCode::BackTab, KeyModifiers::SHIFT)),
            Handled::Yes
        );
        assert_eq!(rt.doc().active_element(), Some(dialog));
    }

    #[tokio::test]
    async fn test_open_close_cycles_reclaim_layers() {
        let mut p = page();
        let main = p.main;
        let host = p.rt.mount(main, Modal::new(), &[]);
        p.rt.flush().await;

        let mut counts = Vec::new();
        for _ in 0..50 {
            p.rt.set_attribute(host, "open", "");
            p.rt.flush().await;
            assert_eq!(p.rt.overlay().depth(), 1);
            p.rt.remove_attribute(host, "open");
            p.rt.flush().await;
            counts.push(p.rt.doc().node_count());
        }
        // The first cycle creates the overlay root; later cycles add nothing
        assert!(counts.windows(2).all(|w| w[0] == w[1]), "{counts:?}");
    }

    #[tokio::test]
    async fn test_toggle() {
        let mut p = page();
        let main = p.main;
        let host = p.rt.mount(main, Modal::new(), &[]);
        p.rt.flush().await;

        p.rt.with::<Modal, _>(host, |modal, cx| modal.toggle(cx));
        assert!(p.rt.component::<Modal>(host).unwrap().is_open());
        p.rt.flush().await;
        p.rt.with::<Modal, _>(host, |modal, cx| modal.toggle(cx));
        assert!(!p.rt.component::<Modal>(host).unwrap().is_open());
    }

    #[test]
    fn test_attribute_names() {
        for attr in ModalAttr::ALL {
            assert_eq!(ModalAttr::parse(attr.as_str()), Some(attr));
        }
        assert_eq!(ModalAttr::parse("hidden"), None);
    }
}
