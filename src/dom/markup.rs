//! Template markup parsing
//!
//! Templates are parsed as HTML by html5ever, so void elements, boolean
//! attributes and entity references behave the way they do in a browser.
//! The parsed tree is walked once and copied into the arena; whatever the
//! parser placed under `<head>` and `<body>` becomes the fragment's children.

use super::{Document, NodeId};
use html5ever::tendril::TendrilSink as _;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::{parse_document, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Errors raised while turning template text into nodes
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MarkupError {
    #[error("failed to read markup: {0}")]
    Read(String),
}

/// Parse `markup` into a new detached fragment and return the fragment
pub fn parse_fragment(doc: &mut Document, markup: &str) -> Result<NodeId, MarkupError> {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            exact_errors: false,
            scripting_enabled: false,
            ..TreeBuilderOpts::default()
        },
        ..ParseOpts::default()
    };

    let dom = parse_document(RcDom::default(), opts)
        .from_utf8()
        .read_from(&mut markup.as_bytes())
        .map_err(|e| MarkupError::Read(e.to_string()))?;

    let fragment = doc.create_fragment();
    for section in document_sections(&dom.document) {
        for child in section.children.borrow().iter() {
            copy_node(doc, child, fragment);
        }
    }
    Ok(fragment)
}

/// `<head>` and `<body>` of the implied `<html>` element
fn document_sections(document: &Handle) -> Vec<Handle> {
    let children = document.children.borrow();
    let Some(html) = children
        .iter()
        .find(|c| matches!(&c.data, NodeData::Element { name, .. } if &*name.local == "html"))
    else {
        return Vec::new();
    };
    let sections = html.children.borrow().clone();
    sections
}

fn copy_node(doc: &mut Document, handle: &Handle, parent: NodeId) {
    match &handle.data {
        NodeData::Element { name, attrs, .. } => {
            let element = doc.create_element(&name.local);
            for attr in attrs.borrow().iter() {
                doc.set_attr(element, &attr.name.local, attr.value.to_string());
            }
            doc.append_child(parent, element);
            for child in handle.children.borrow().iter() {
                copy_node(doc, child, element);
            }
        }
        NodeData::Text { contents } => {
            let text = contents.borrow();
            // Formatting whitespace between tags
            if !text.trim().is_empty() {
                let node = doc.create_text(text.to_string());
                doc.append_child(parent, node);
            }
        }
        // Comments, doctypes, processing instructions
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_fragment() {
        let mut doc = Document::new();
        let fragment = parse_fragment(
            &mut doc,
            r#"
            <div class="backdrop"></div>
            <div class="dialog" role="dialog" tabindex="-1">
                <button disabled>Close &amp; leave</button>
                <input type="text">
                <!-- trailing comment -->
            </div>
            "#,
        )
        .unwrap();

        let top = doc.children(fragment).to_vec();
        assert_eq!(top.len(), 2);
        let dialog = top[1];
        assert_eq!(doc.attr(dialog, "role"), Some("dialog"));
        assert_eq!(doc.children(dialog).len(), 2);

        let button = doc.query(dialog, "button").unwrap();
        assert!(doc.has_attr(button, "disabled"));
        assert_eq!(doc.text_content(button), "Close & leave");
        assert!(doc.query(dialog, "input[type=\"text\"]").is_some());
    }

    #[test]
    fn test_plain_text_and_unbalanced_markup() {
        let mut doc = Document::new();
        let text = parse_fragment(&mut doc, "Hello").unwrap();
        assert_eq!(doc.text_content(text), "Hello");

        // Recovered the way a browser would: the stray close tag is dropped
        // and the open list item is closed at the end of input
        let list = parse_fragment(&mut doc, "<ul><li>open</span>").unwrap();
        let li = doc.query(list, "li").unwrap();
        assert_eq!(doc.text_content(li), "open");
    }

    #[test]
    fn test_self_closing_and_custom_elements() {
        let mut doc = Document::new();
        let fragment = parse_fragment(
            &mut doc,
            r#"<div class="rs"><input role="combobox" /><slot></slot><ul role="listbox"></ul></div>"#,
        )
        .unwrap();
        let rs = doc.query(fragment, ".rs").unwrap();
        let tags: Vec<_> = doc
            .children(rs)
            .iter()
            .filter_map(|c| doc.tag(*c).map(str::to_string))
            .collect();
        assert_eq!(tags, ["input", "slot", "ul"]);
    }
}
