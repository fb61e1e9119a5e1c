//! Declarative data binding into cloned template content
//!
//! Markers understood inside a template:
//!
//! | attribute                      | effect                                     |
//! |--------------------------------|--------------------------------------------|
//! | `data-bind="key"`              | text content = value                       |
//! | `data-bind-attr="a:key b:key"` | attribute = value, removed when null/empty |
//! | `data-bind-html="key"`         | children = parsed markup of value          |
//! | `data-if="key"`                | element pruned when value is falsy         |
//! | `data-unless="key"`            | element pruned when value is truthy        |
//!
//! Keys are dotted paths into the data object (`speaker.name`). Falsy means
//! missing, null, `false`, the empty string or an empty array; `0` is truthy.

use crate::dom::{parse_fragment, Document, MarkupError, NodeId};
use serde_json::Value;

/// Resolve a dotted path inside `data`
pub fn lookup<'a>(data: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(data, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

/// String form used for text and attribute bindings
fn display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Apply every binding marker under `root` using `data`
pub fn bind(doc: &mut Document, root: NodeId, data: &Value) -> Result<(), MarkupError> {
    // Conditionals first so pruned subtrees are never populated
    for node in doc.query_all(root, "[data-if], [data-unless]") {
        let keep_if = doc
            .attr(node, "data-if")
            .map_or(true, |key| is_truthy(lookup(data, key)));
        let keep_unless = doc
            .attr(node, "data-unless")
            .map_or(true, |key| !is_truthy(lookup(data, key)));
        if !(keep_if && keep_unless) {
            doc.discard(node);
        }
    }

    for node in doc.query_all(root, "[data-bind]") {
        if let Some(key) = doc.attr(node, "data-bind").map(str::to_string) {
            let text = display(lookup(data, &key));
            doc.set_text_content(node, &text);
        }
    }

    for node in doc.query_all(root, "[data-bind-attr]") {
        let Some(spec) = doc.attr(node, "data-bind-attr").map(str::to_string) else {
            continue;
        };
        for pair in spec.split_whitespace() {
            let Some((attr, key)) = pair.split_once(':') else {
                tracing::debug!(pair, "ignoring malformed data-bind-attr entry");
                continue;
            };
            let value = display(lookup(data, key));
            if value.is_empty() {
                doc.remove_attr(node, attr);
            } else {
                doc.set_attr(node, attr, value);
            }
        }
    }

    for node in doc.query_all(root, "[data-bind-html]") {
        let Some(key) = doc.attr(node, "data-bind-html").map(str::to_string) else {
            continue;
        };
        let html = display(lookup(data, &key));
        let content = parse_fragment(doc, &html)?;
        doc.clear_children(node);
        doc.move_children(content, node);
        doc.discard(content);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fragment(doc: &mut Document, markup: &str) -> NodeId {
        parse_fragment(doc, markup).unwrap()
    }

    #[test]
    fn test_text_and_attribute_bindings() {
        let mut doc = Document::new();
        let root = fragment(
            &mut doc,
            r#"<article>
                <h2 data-bind="speaker.name">placeholder</h2>
                <a data-bind-attr="href:speaker.url title:missing" title="old">link</a>
                <span data-bind="talks">x</span>
            </article>"#,
        );
        let data = json!({
            "speaker": { "name": "Ada", "url": "/speakers/ada" },
            "talks": 3
        });
        bind(&mut doc, root, &data).unwrap();

        let h2 = doc.query(root, "h2").unwrap();
        let link = doc.query(root, "a").unwrap();
        let talks = doc.query(root, "span").unwrap();
        assert_eq!(doc.text_content(h2), "Ada");
        assert_eq!(doc.attr(link, "href"), Some("/speakers/ada"));
        assert_eq!(doc.attr(link, "title"), None);
        assert_eq!(doc.text_content(talks), "3");
    }

    #[test]
    fn test_conditionals_prune_falsy_values() {
        let mut doc = Document::new();
        let root = fragment(
            &mut doc,
            r#"<div>
                <p class="bio" data-if="bio">bio</p>
                <p class="tags" data-if="tags">tags</p>
                <p class="count" data-if="count">count</p>
                <p class="empty" data-unless="tags">no tags</p>
                <p class="flag" data-unless="featured">regular</p>
            </div>"#,
        );
        let data = json!({ "bio": "", "tags": [], "count": 0, "featured": true });
        bind(&mut doc, root, &data).unwrap();

        assert!(doc.query(root, ".bio").is_none());
        assert!(doc.query(root, ".tags").is_none());
        assert!(doc.query(root, ".count").is_some());
        assert!(doc.query(root, ".empty").is_some());
        assert!(doc.query(root, ".flag").is_none());
    }

    #[test]
    fn test_html_binding_injects_markup() {
        let mut doc = Document::new();
        let root = fragment(&mut doc, r#"<div><section data-bind-html="body">old</section></div>"#);
        bind(&mut doc, root, &json!({ "body": "<em>new</em> text" })).unwrap();

        let section = doc.query(root, "section").unwrap();
        assert!(doc.query(section, "em").is_some());
        assert_eq!(doc.text_content(section), "new text");
    }

    #[test]
    fn test_lookup_paths() {
        let data = json!({ "a": { "b": [ { "c": "deep" } ] } });
        assert_eq!(lookup(&data, "a.b.0.c"), Some(&json!("deep")));
        assert_eq!(lookup(&data, "a.x"), None);
        assert_eq!(lookup(&data, "a.b.c"), None);
    }
}
