//! Combobox options: static light-DOM options, remote coercion, local filter

use crate::dom::{Document, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One selectable entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboOption {
    pub value: String,
    pub label: String,
}

impl ComboOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    fn matches(&self, needle: &str) -> bool {
        self.label.to_lowercase().contains(needle) || self.value.to_lowercase().contains(needle)
    }
}

/// Read `<option value="...">Label</option>` children of the host
///
/// As with HTML options, a missing `value` falls back to the label text.
pub fn static_options(doc: &Document, host: NodeId) -> Vec<ComboOption> {
    doc.children(host)
        .iter()
        .filter(|child| doc.tag(**child) == Some("option"))
        .map(|option| {
            let label = doc.text_content(*option).trim().to_string();
            let value = doc
                .attr(*option, "value")
                .map(str::to_string)
                .unwrap_or_else(|| label.clone());
            ComboOption { value, label }
        })
        .collect()
}

/// Case-insensitive substring match over label or value
pub fn filter_local(options: &[ComboOption], query: &str) -> Vec<ComboOption> {
    let needle = query.to_lowercase();
    options
        .iter()
        .filter(|option| option.matches(&needle))
        .cloned()
        .collect()
}

fn coerce_field(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Turn an untrusted search response into options
///
/// Anything but an array yields no options; `value` and `label` are forced
/// to strings and missing fields become empty.
pub fn coerce_options(data: &Value) -> Vec<ComboOption> {
    let Value::Array(items) = data else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| ComboOption {
            value: coerce_field(item.get("value")),
            label: coerce_field(item.get("label")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fruit() -> Vec<ComboOption> {
        vec![
            ComboOption::new("apple", "Apple"),
            ComboOption::new("banana", "Banana"),
            ComboOption::new("cherry", "Cherry"),
        ]
    }

    #[test]
    fn test_filter_matches_label_or_value_case_insensitively() {
        assert_eq!(
            filter_local(&fruit(), "an"),
            vec![ComboOption::new("banana", "Banana")]
        );
        assert_eq!(filter_local(&fruit(), "CHER").len(), 1);
        assert_eq!(filter_local(&fruit(), "").len(), 3);

        let coded = vec![ComboOption::new("DK", "Danmark"), ComboOption::new("SE", "Sverige")];
        assert_eq!(filter_local(&coded, "se"), vec![ComboOption::new("SE", "Sverige")]);
    }

    #[test]
    fn test_coercion_of_untrusted_results() {
        let data = json!([
            { "value": "DK", "label": "Danmark" },
            { "value": 45, "label": true },
            { "label": "No value" },
            { "value": null, "label": null },
            "not an object"
        ]);
        assert_eq!(
            coerce_options(&data),
            vec![
                ComboOption::new("DK", "Danmark"),
                ComboOption::new("45", "true"),
                ComboOption::new("", "No value"),
                ComboOption::new("", ""),
                ComboOption::new("", ""),
            ]
        );
        assert!(coerce_options(&json!({ "value": "x" })).is_empty());
        assert!(coerce_options(&json!(null)).is_empty());
    }

    #[test]
    fn test_static_options_from_light_children() {
        let mut doc = Document::new();
        let host = doc.create_element("app-rich-select");
        for (value, label) in [(Some("DK"), " Danmark "), (None, "Norge")] {
            let option = doc.create_element("option");
            if let Some(value) = value {
                doc.set_attr(option, "value", value);
            }
            let text = doc.create_text(label);
            doc.append_child(option, text);
            doc.append_child(host, option);
        }
        let stray = doc.create_element("span");
        doc.append_child(host, stray);

        assert_eq!(
            static_options(&doc, host),
            vec![
                ComboOption::new("DK", "Danmark"),
                ComboOption::new("Norge", "Norge"),
            ]
        );
    }
}
