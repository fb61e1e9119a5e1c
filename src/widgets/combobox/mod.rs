//! `<app-rich-select>` - search combobox
//!
//! A text input with a popup listbox. Options come from `<option>` children
//! of the host, or from a remote endpoint once the query is long enough:
//!
//! ```text
//!  keystroke ──▶ TextField edit ──▶ combobox:query:input
//!                     │
//!        endpoint && chars >= min-chars ?
//!          │ yes                         │ no
//!          ▼                             ▼
//!  SearchScheduler (debounced,      filter static options
//!  latest sequence wins)                 │
//!          │ mail                        │
//!          ▼                             ▼
//!  fetch:start / fetch:end ──────▶ render list, announce count
//!                                        │
//!                                        ▼
//!                               inline typeahead (unless suppressed)
//! ```

pub mod options;
pub mod placement;
pub mod search;
pub mod typeahead;

pub use options::{coerce_options, filter_local, static_options, ComboOption};
pub use placement::{Placement, PlacementMode, Side};
pub use search::{HttpSearchClient, SearchClient, SearchError, SearchMessage, SearchScheduler};
pub use typeahead::{apply_typeahead, should_suppress, EditKind, TextField};

use crate::config::{Config, WidgetsConfig};
use crate::dom::NodeId;
use crate::events::{names, ChangeDetail, FetchEndDetail, FetchErrorDetail, QueryDetail};
use crate::runtime::{Component, Cx, Handled, RuntimeError, Templates};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;

/// Observed host attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComboboxAttr {
    Name,
    Value,
    Placeholder,
    Disabled,
    Endpoint,
    MinChars,
    NoResultText,
    Autocomplete,
    Typeahead,
    Placement,
}

impl ComboboxAttr {
    pub const ALL: [ComboboxAttr; 10] = [
        Self::Name,
        Self::Value,
        Self::Placeholder,
        Self::Disabled,
        Self::Endpoint,
        Self::MinChars,
        Self::NoResultText,
        Self::Autocomplete,
        Self::Typeahead,
        Self::Placement,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Value => "value",
            Self::Placeholder => "placeholder",
            Self::Disabled => "disabled",
            Self::Endpoint => "endpoint",
            Self::MinChars => "min-chars",
            Self::NoResultText => "no-result-text",
            Self::Autocomplete => "autocomplete",
            Self::Typeahead => "typeahead",
            Self::Placement => "placement",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == name)
    }
}

/// Elements of the rendered template
#[derive(Debug, Clone, Copy)]
struct Parts {
    wrapper: NodeId,
    input: NodeId,
    toggle: Option<NodeId>,
    list: NodeId,
    live: Option<NodeId>,
}

pub struct Combobox {
    settings: WidgetsConfig,
    client: Option<Arc<dyn SearchClient>>,
    scheduler: SearchScheduler,
    parts: Option<Parts>,
    field: TextField,
    /// Static options from the light DOM
    options: Vec<ComboOption>,
    /// What the list currently shows
    filtered: Vec<ComboOption>,
    rows: Vec<NodeId>,
    active: Option<usize>,
    open: bool,
    /// Raised by Backspace/Delete, consumed by the next edit
    suppress_typeahead: bool,
    scroll_top: f64,
    placement: Option<Placement>,
}

impl Combobox {
    pub fn new(settings: WidgetsConfig) -> Self {
        let scheduler = SearchScheduler::new(settings.debounce());
        Self {
            settings,
            client: None,
            scheduler,
            parts: None,
            field: TextField::new(),
            options: Vec::new(),
            filtered: Vec::new(),
            rows: Vec::new(),
            active: None,
            open: false,
            suppress_typeahead: false,
            scroll_top: 0.0,
            placement: None,
        }
    }

    /// Client used when the `endpoint` attribute is set
    /// Combobox with `config.widgets` defaults, searching against
    /// `config.origin`
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = HttpSearchClient::new(&config.origin)?;
        Ok(Self::new(config.widgets.clone()).with_search(Arc::new(client)))
    }

    pub fn with_search(mut self, client: Arc<dyn SearchClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn text(&self) -> &str {
        self.field.text()
    }

    pub fn field(&self) -> &TextField {
        &self.field
    }

    pub fn filtered(&self) -> &[ComboOption] {
        &self.filtered
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    /// Vertical scroll offset of the list
    pub fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    pub fn placement(&self) -> Option<Placement> {
        self.placement
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Attributes
    // ─────────────────────────────────────────────────────────────────────────

    fn name(cx: &Cx<'_>) -> String {
        cx.attr(ComboboxAttr::Name.as_str())
            .unwrap_or_default()
            .to_string()
    }

    fn id_prefix(cx: &Cx<'_>) -> String {
        match cx.attr(ComboboxAttr::Name.as_str()) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => "rs".to_string(),
        }
    }

    fn endpoint(cx: &Cx<'_>) -> Option<String> {
        cx.attr(ComboboxAttr::Endpoint.as_str())
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
    }

    fn is_disabled(cx: &Cx<'_>) -> bool {
        cx.has_attr(ComboboxAttr::Disabled.as_str())
    }

    fn typeahead_enabled(cx: &Cx<'_>) -> bool {
        cx.attr(ComboboxAttr::Typeahead.as_str()) != Some("false")
    }

    fn min_chars(&self, cx: &Cx<'_>) -> usize {
        cx.attr(ComboboxAttr::MinChars.as_str())
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(self.settings.min_chars)
    }

    fn no_result_text(&self, cx: &Cx<'_>) -> String {
        cx.attr(ComboboxAttr::NoResultText.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or(self.settings.no_result_text.as_str())
            .to_string()
    }

    fn apply_input_attrs(&self, cx: &mut Cx<'_>) {
        let Some(parts) = self.parts else {
            return;
        };
        let placeholder = cx
            .attr(ComboboxAttr::Placeholder.as_str())
            .unwrap_or_default()
            .to_string();
        let autocomplete = cx
            .attr(ComboboxAttr::Autocomplete.as_str())
            .unwrap_or("off")
            .to_string();
        let disabled = Self::is_disabled(cx);
        cx.doc.set_attr(parts.input, "placeholder", placeholder);
        cx.doc.set_attr(parts.input, "autocomplete", autocomplete);
        cx.doc.toggle_attr(parts.input, "disabled", disabled);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Notifications
    // ─────────────────────────────────────────────────────────────────────────

    fn notify(cx: &Cx<'_>, name: &str, detail: impl Serialize) {
        if let Err(e) = cx.dispatch_named_event(name, detail) {
            tracing::error!(error = %e, event = name, "combobox notification rejected");
        }
    }

    fn announce(&self, cx: &mut Cx<'_>, text: &str) {
        if let Some(live) = self.parts.and_then(|p| p.live) {
            cx.doc.set_text_content(live, text);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Popup
    // ─────────────────────────────────────────────────────────────────────────

    fn open_popup(&mut self, cx: &mut Cx<'_>) {
        if self.open || Self::is_disabled(cx) {
            return;
        }
        self.open = true;
        self.reflect_open(cx);
        self.update_placement(cx);
        Self::notify(cx, names::COMBOBOX_OPEN, ());
    }

    fn close_popup(&mut self, cx: &mut Cx<'_>) {
        if !self.open {
            return;
        }
        self.open = false;
        self.reflect_open(cx);
        Self::notify(cx, names::COMBOBOX_CLOSE, ());
    }

    fn toggle_popup(&mut self, cx: &mut Cx<'_>) {
        if self.open {
            self.close_popup(cx);
        } else {
            self.open_popup(cx);
        }
    }

    fn reflect_open(&self, cx: &mut Cx<'_>) {
        let Some(parts) = self.parts else {
            return;
        };
        cx.doc.toggle_class(parts.wrapper, "rs--open", self.open);
        let expanded = if self.open { "true" } else { "false" };
        cx.doc.set_attr(parts.input, "aria-expanded", expanded);
    }

    /// Choose the side and height of the list from the host's bounds
    fn update_placement(&mut self, cx: &mut Cx<'_>) {
        let Some(parts) = self.parts else {
            return;
        };
        let host = cx.host();
        let Some(control) = cx.doc.bounds(host) else {
            tracing::trace!(host = host.index(), "no layout for combobox, skipping placement");
            return;
        };
        let mode = PlacementMode::parse(cx.attr(ComboboxAttr::Placement.as_str()));
        let natural = self.rows.len().max(1) as f64 * self.settings.row_height;
        let placement = placement::compute(
            mode,
            control,
            cx.viewport(),
            natural,
            self.settings.popup_margin,
            self.settings.min_popup_height,
        );

        cx.doc
            .toggle_class(parts.wrapper, Side::Above.class(), placement.side == Side::Above);
        cx.doc
            .toggle_class(parts.wrapper, Side::Below.class(), placement.side == Side::Below);
        cx.doc
            .set_style(parts.list, "max-height", &format!("{}px", placement.max_height));
        self.placement = Some(placement);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // List
    // ─────────────────────────────────────────────────────────────────────────

    /// Rebuild the rows from `filtered` and select the first one
    fn render_list(&mut self, cx: &mut Cx<'_>) {
        let Some(parts) = self.parts else {
            return;
        };
        cx.doc.clear_children(parts.list);
        self.rows.clear();
        self.scroll_top = 0.0;

        if self.filtered.is_empty() {
            let text = self.no_result_text(cx);
            let row = cx.doc.create_element("li");
            cx.doc.add_class(row, "rs__nores");
            cx.doc.set_attr(row, "role", "option");
            cx.doc.set_attr(row, "aria-disabled", "true");
            cx.doc.set_text_content(row, &text);
            cx.doc.append_child(parts.list, row);
            self.set_active(cx, None);
            self.announce(cx, &format!("{text}."));
        } else {
            let prefix = Self::id_prefix(cx);
            for (index, option) in self.filtered.iter().enumerate() {
                let row = cx.doc.create_element("li");
                cx.doc.add_class(row, "rs__item");
                cx.doc.set_attr(row, "role", "option");
                cx.doc.set_attr(row, "aria-selected", "false");
                cx.doc.set_attr(row, "id", format!("{prefix}-opt-{index}"));
                cx.doc.set_attr(row, "data-index", index.to_string());
                cx.doc.set_attr(row, "data-value", option.value.as_str());
                cx.doc.set_text_content(row, &option.label);
                cx.doc.append_child(parts.list, row);
                self.rows.push(row);
            }
            self.set_active(cx, Some(0));
            let announcement = self.settings.results_announcement(self.filtered.len());
            self.announce(cx, &announcement);
        }

        if self.open {
            self.update_placement(cx);
        }
    }

    /// Make `index` the active row, clamped to the list
    fn set_active(&mut self, cx: &mut Cx<'_>, index: Option<isize>) {
        let Some(parts) = self.parts else {
            return;
        };
        let len = self.filtered.len();
        self.active = match index {
            Some(i) if len > 0 => Some(i.clamp(0, len as isize - 1) as usize),
            _ => None,
        };

        for (i, row) in self.rows.iter().enumerate() {
            let on = self.active == Some(i);
            cx.doc.toggle_class(*row, "rs__item--active", on);
            cx.doc
                .set_attr(*row, "aria-selected", if on { "true" } else { "false" });
        }

        match self.active.and_then(|i| self.rows.get(i).copied()) {
            Some(row) => {
                let id = cx.doc.attr(row, "id").unwrap_or_default().to_string();
                cx.doc.set_attr(parts.input, "aria-activedescendant", id);
                self.ensure_in_view();
            }
            None => {
                cx.doc.remove_attr(parts.input, "aria-activedescendant");
            }
        }
    }

    fn move_active(&mut self, cx: &mut Cx<'_>, delta: isize) {
        let current = self.active.map_or(-1, |i| i as isize);
        self.set_active(cx, Some(current + delta));
    }

    /// Scroll the list just enough to show the active row
    fn ensure_in_view(&mut self) {
        let Some(index) = self.active else {
            return;
        };
        let row_height = self.settings.row_height;
        let view = self
            .placement
            .map_or(self.rows.len() as f64 * row_height, |p| p.max_height);
        let top = index as f64 * row_height;
        let bottom = top + row_height;
        if top < self.scroll_top {
            self.scroll_top = top;
        } else if bottom > self.scroll_top + view {
            self.scroll_top = bottom - view;
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Editing
    // ─────────────────────────────────────────────────────────────────────────

    fn sync_input(&self, cx: &mut Cx<'_>) {
        if let Some(parts) = self.parts {
            cx.doc.set_attr(parts.input, "value", self.field.text());
        }
    }

    fn text_changed(&mut self, cx: &mut Cx<'_>, kind: EditKind) {
        self.sync_input(cx);
        let query = self.field.text().to_string();
        Self::notify(
            cx,
            names::COMBOBOX_INPUT,
            QueryDetail {
                query: query.clone(),
            },
        );
        self.filter_and_maybe_fetch(cx, &query, kind);
    }

    fn filter_and_maybe_fetch(&mut self, cx: &mut Cx<'_>, raw: &str, kind: EditKind) {
        let query = raw.trim();
        let endpoint =
            Self::endpoint(cx).filter(|_| query.chars().count() >= self.min_chars(cx));

        let client = endpoint.as_ref().and(self.client.clone());
        match (endpoint, client) {
            (Some(endpoint), Some(client)) => {
                self.scheduler
                    .schedule(client, &endpoint, query, cx.postman());
            }
            (endpoint, _) => {
                if endpoint.is_some() {
                    tracing::warn!(host = cx.host().index(), "endpoint set but no search client");
                }
                // A pending remote search must not overwrite the local result
                self.scheduler.cancel();
                self.filtered = filter_local(&self.options, query);
                self.render_list(cx);
            }
        }

        if !self.open {
            self.open_popup(cx);
        }

        if Self::typeahead_enabled(cx)
            && !should_suppress(&mut self.suppress_typeahead, kind.as_str(), &self.field)
            && apply_typeahead(&mut self.field, query, self.filtered.first())
        {
            self.sync_input(cx);
        }
    }

    fn commit(&mut self, cx: &mut Cx<'_>, index: usize) {
        let Some(option) = self.filtered.get(index).cloned() else {
            return;
        };
        cx.reflect_attr(ComboboxAttr::Value.as_str(), &option.value);
        self.field.set_text(&option.label);
        self.sync_input(cx);
        self.close_popup(cx);
        tracing::debug!(host = cx.host().index(), value = %option.value, "combobox committed");
        Self::notify(
            cx,
            names::COMBOBOX_CHANGE,
            ChangeDetail {
                value: option.value,
                label: option.label,
                name: Self::name(cx),
            },
        );
    }

    fn on_search(&mut self, cx: &mut Cx<'_>, message: SearchMessage) {
        match message {
            SearchMessage::Started { query, .. } => {
                Self::notify(cx, names::COMBOBOX_FETCH_START, QueryDetail { query });
            }
            SearchMessage::Finished { seq, query, result } => {
                let stale = !self.scheduler.is_current(seq);
                let count = match result {
                    Ok(options) => {
                        let count = options.len();
                        if !stale {
                            self.filtered = options;
                            self.render_list(cx);
                        }
                        count
                    }
                    Err(e) => {
                        tracing::error!(seq, %query, error = %e, "combobox search failed");
                        if !stale {
                            self.filtered.clear();
                            self.render_list(cx);
                        }
                        Self::notify(
                            cx,
                            names::COMBOBOX_FETCH_ERROR,
                            FetchErrorDetail {
                                query: query.clone(),
                                error: e.to_string(),
                            },
                        );
                        0
                    }
                };
                if stale {
                    tracing::debug!(seq, %query, "dropping stale search result");
                }
                Self::notify(
                    cx,
                    names::COMBOBOX_FETCH_END,
                    FetchEndDetail {
                        query,
                        count,
                        stale,
                    },
                );
            }
        }
    }
}

impl Component for Combobox {
    fn tag(&self) -> &'static str {
        "app-rich-select"
    }

    fn templates(&self) -> Templates {
        Templates::component("atoms", "rich-select")
    }

    fn attribute_changed(
        &mut self,
        cx: &mut Cx<'_>,
        name: &str,
        old: Option<&str>,
        new: Option<&str>,
    ) {
        if old == new || self.parts.is_none() {
            return;
        }
        // Updated in place; the list and text survive attribute changes
        match ComboboxAttr::parse(name) {
            Some(ComboboxAttr::Placeholder | ComboboxAttr::Autocomplete) => {
                self.apply_input_attrs(cx)
            }
            Some(ComboboxAttr::Disabled) => {
                self.apply_input_attrs(cx);
                if Self::is_disabled(cx) {
                    self.close_popup(cx);
                }
            }
            Some(ComboboxAttr::Value) => {
                let value = new.unwrap_or_default();
                if self.field.text() != value {
                    self.field.set_text(value);
                    self.sync_input(cx);
                }
            }
            Some(ComboboxAttr::Placement) => {
                if self.open {
                    self.update_placement(cx);
                }
            }
            // Read when next needed
            Some(
                ComboboxAttr::Name
                | ComboboxAttr::Endpoint
                | ComboboxAttr::MinChars
                | ComboboxAttr::NoResultText
                | ComboboxAttr::Typeahead,
            )
            | None => {}
        }
    }

    fn render(&mut self, cx: &mut Cx<'_>, content: NodeId) -> Result<(), RuntimeError> {
        let parts = Parts {
            wrapper: cx.require(content, ".rs")?,
            input: cx.require(content, "input[role=\"combobox\"]")?,
            toggle: cx.doc.query(content, ".rs__toggle"),
            list: cx.require(content, "[role=\"listbox\"]")?,
            live: cx.doc.query(content, ".rs__live"),
        };
        self.parts = Some(parts);

        let prefix = Self::id_prefix(cx);
        let listbox_id = format!("{prefix}-listbox");
        cx.doc.set_attr(parts.list, "id", listbox_id.as_str());
        cx.doc.set_attr(parts.input, "aria-controls", listbox_id);
        self.apply_input_attrs(cx);

        let host = cx.host();
        self.options = static_options(cx.doc, host);

        // Show the label of a preset value when it is one of the options
        let value = cx
            .attr(ComboboxAttr::Value.as_str())
            .unwrap_or_default()
            .to_string();
        let shown = self
            .options
            .iter()
            .find(|o| !value.is_empty() && o.value == value)
            .map_or(value.as_str(), |o| o.label.as_str())
            .to_string();
        self.field.set_text(&shown);
        self.sync_input(cx);

        self.open = false;
        self.placement = None;
        self.filtered = self.options.clone();
        self.render_list(cx);
        self.reflect_open(cx);
        Ok(())
    }

    fn disconnected(&mut self, _cx: &mut Cx<'_>) {
        self.scheduler.cancel();
        self.open = false;
    }

    fn key_down(&mut self, cx: &mut Cx<'_>, key: KeyEvent) -> Handled {
        let Some(parts) = self.parts else {
            return Handled::No;
        };
        if cx.doc.active_element() != Some(parts.input) || Self::is_disabled(cx) {
            return Handled::No;
        }

        if matches!(key.code, KeyCode::Backspace | KeyCode::Delete) {
            self.suppress_typeahead = true;
        }

        if !self.open && matches!(key.code, KeyCode::Down | KeyCode::Up) {
            self.open_popup(cx);
            self.move_active(cx, if key.code == KeyCode::Down { 1 } else { -1 });
            return Handled::Yes;
        }

        let page = self.settings.page_step as isize;
        match key.code {
            KeyCode::Down => self.move_active(cx, 1),
            KeyCode::Up => self.move_active(cx, -1),
            KeyCode::Home => self.set_active(cx, Some(0)),
            KeyCode::End => {
                let last = self.filtered.len() as isize - 1;
                self.set_active(cx, Some(last));
            }
            KeyCode::PageDown => self.move_active(cx, page),
            KeyCode::PageUp => self.move_active(cx, -page),
            KeyCode::Enter => match self.active {
                Some(index) if self.open => self.commit(cx, index),
                _ => return Handled::No,
            },
            KeyCode::Esc => {
                let was_open = self.open;
                self.close_popup(cx);
                return Handled::from(was_open);
            }
            KeyCode::Tab | KeyCode::BackTab => {
                // Close, then let focus move on
                self.close_popup(cx);
                return Handled::No;
            }
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.field.insert(c);
                self.text_changed(cx, EditKind::InsertText);
            }
            KeyCode::Backspace => {
                if self.field.backspace() {
                    self.text_changed(cx, EditKind::DeleteContentBackward);
                }
            }
            KeyCode::Delete => {
                if self.field.delete() {
                    self.text_changed(cx, EditKind::DeleteContentForward);
                }
            }
            KeyCode::Left => self.field.move_caret(false),
            KeyCode::Right => self.field.move_caret(true),
            _ => return Handled::No,
        }
        Handled::Yes
    }

    fn click(&mut self, cx: &mut Cx<'_>, target: NodeId) -> Handled {
        let Some(parts) = self.parts else {
            return Handled::No;
        };

        if parts.toggle.is_some_and(|t| cx.doc.contains(t, target)) {
            if Self::is_disabled(cx) {
                return Handled::Yes;
            }
            self.toggle_popup(cx);
            if self.open {
                cx.doc.focus(parts.input);
            }
            return Handled::Yes;
        }

        if !cx.doc.contains(parts.list, target) {
            return Handled::No;
        }
        let Some(row) = cx.doc.closest(target, "[role=\"option\"]", parts.list) else {
            return Handled::No;
        };
        if cx.doc.attr(row, "aria-disabled") == Some("true") {
            return Handled::Yes;
        }
        if let Some(index) = cx
            .doc
            .attr(row, "data-index")
            .and_then(|i| i.parse::<usize>().ok())
        {
            self.commit(cx, index);
        }
        Handled::Yes
    }

    fn pointer_down(&mut self, cx: &mut Cx<'_>, target: NodeId) {
        if !self.open {
            return;
        }
        // Shadow content and slotted children both count as inside
        if !cx.doc.contains(cx.host(), target) {
            self.close_popup(cx);
        }
    }

    fn viewport_changed(&mut self, cx: &mut Cx<'_>) {
        if self.open {
            self.update_placement(cx);
        }
    }

    fn mail(&mut self, cx: &mut Cx<'_>, payload: Box<dyn Any + Send>) {
        match payload.downcast::<SearchMessage>() {
            Ok(message) => self.on_search(cx, *message),
            Err(_) => tracing::warn!(host = cx.host().index(), "unexpected combobox mail"),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
