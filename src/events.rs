// Component notifications that flow from widgets to the embedding application
//
// Every cross-component notification is named `domain:subject:action`
// (lowercase ASCII letters and digits) and carries a JSON detail payload.
// Events bubble along the logical tree, so an ancestor listening on its own
// node sees events raised deep inside a widget's shadow tree or portal layer.

use crate::dom::{Document, NodeId};
use crate::runtime::RuntimeError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;
use tokio::sync::mpsc;

static EVENT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+:[a-z0-9]+:[a-z0-9]+$").expect("static event name pattern")
});

/// A validated `domain:subject:action` event name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EventName(String);

impl EventName {
    /// Validate `name` against the three-segment convention
    pub fn parse(name: &str) -> Result<Self, RuntimeError> {
        if EVENT_NAME.is_match(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(RuntimeError::InvalidEventName(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Well-known notification names raised by the bundled widgets
pub mod names {
    pub const MODAL_OPENED: &str = "modal:dialog:opened";
    pub const MODAL_CLOSED: &str = "modal:dialog:closed";

    pub const COMBOBOX_CHANGE: &str = "combobox:value:change";
    pub const COMBOBOX_INPUT: &str = "combobox:query:input";
    pub const COMBOBOX_OPEN: &str = "combobox:popup:open";
    pub const COMBOBOX_CLOSE: &str = "combobox:popup:close";
    pub const COMBOBOX_FETCH_START: &str = "combobox:fetch:start";
    pub const COMBOBOX_FETCH_END: &str = "combobox:fetch:end";
    pub const COMBOBOX_FETCH_ERROR: &str = "combobox:fetch:error";
}

/// A dispatched notification
#[derive(Debug, Clone, Serialize)]
pub struct ComponentEvent {
    pub name: EventName,
    pub detail: serde_json::Value,
    /// Host element that raised the event
    pub target: NodeId,
    /// Propagation path, innermost first
    pub path: Vec<NodeId>,
    pub bubbles: bool,
    pub composed: bool,
    pub timestamp: DateTime<Utc>,
}

impl ComponentEvent {
    /// Whether a listener on `node` observes this event
    pub fn reaches(&self, node: NodeId) -> bool {
        if self.bubbles {
            self.path.contains(&node)
        } else {
            self.target == node
        }
    }

    /// Typed view of the detail payload
    pub fn detail_as<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(self.detail.clone()).ok()
    }
}

impl Serialize for NodeId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.index() as u64)
    }
}

/// Receiving end handed to the embedding application
pub type EventStream = mpsc::UnboundedReceiver<ComponentEvent>;

/// Sending half shared by every component instance
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ComponentEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Validate, build and emit an event raised by `target`
    pub fn dispatch(
        &self,
        doc: &Document,
        target: NodeId,
        name: &str,
        detail: impl Serialize,
    ) -> Result<EventName, RuntimeError> {
        let name = EventName::parse(name)?;
        let detail = serde_json::to_value(detail).unwrap_or(serde_json::Value::Null);
        let event = ComponentEvent {
            name: name.clone(),
            detail,
            target,
            path: doc.event_path(target),
            bubbles: true,
            composed: true,
            timestamp: Utc::now(),
        };
        tracing::debug!(event = %event.name, target = target.index(), "dispatch");
        // A closed stream only means nobody is listening any more
        let _ = self.tx.send(event);
        Ok(name)
    }
}

/// Payload of `modal:dialog:opened` / `modal:dialog:closed`
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct ModalDetail {
    pub name: String,
}

/// Payload of `combobox:value:change`
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct ChangeDetail {
    pub value: String,
    pub label: String,
    pub name: String,
}

/// Payload of `combobox:query:input` and `combobox:fetch:start`
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct QueryDetail {
    pub query: String,
}

/// Payload of `combobox:fetch:end`
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct FetchEndDetail {
    pub query: String,
    pub count: usize,
    /// Result arrived after a newer search was scheduled and was discarded
    pub stale: bool,
}

/// Payload of `combobox:fetch:error`
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct FetchErrorDetail {
    pub query: String,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name_validation() {
        assert!(EventName::parse("link:newpdf:click").is_ok());
        assert!(EventName::parse("modal:dialog:opened").is_ok());
        assert!(EventName::parse("a1:b2:c3").is_ok());

        for bad in [
            "modal-opened",
            "Modal:dialog:opened",
            "modal:dialog",
            "modal:dialog:opened:extra",
            "modal::opened",
            "modal:dia log:opened",
            "",
        ] {
            assert!(
                matches!(EventName::parse(bad), Err(RuntimeError::InvalidEventName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_dispatch_bubbles_through_shadow_boundary() {
        let mut doc = Document::new();
        let section = doc.create_element("section");
        let host = doc.create_element("app-modal");
        doc.append_child(doc.body(), section);
        doc.append_child(section, host);

        let (sink, mut stream) = EventSink::channel();
        sink.dispatch(&doc, host, names::MODAL_OPENED, ModalDetail { name: "x".into() })
            .unwrap();

        let event = stream.try_recv().unwrap();
        assert!(event.reaches(section));
        assert!(event.reaches(doc.body()));
        assert_eq!(
            event.detail_as::<ModalDetail>(),
            Some(ModalDetail { name: "x".into() })
        );
    }

    #[test]
    fn test_invalid_name_emits_nothing() {
        let doc = Document::new();
        let (sink, mut stream) = EventSink::channel();
        let result = sink.dispatch(&doc, doc.body(), "modal-opened", serde_json::json!({}));
        assert!(result.is_err());
        assert!(stream.try_recv().is_err());
    }
}
