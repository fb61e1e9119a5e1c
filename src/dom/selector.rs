//! Minimal selector matching
//!
//! Supports comma-separated compound selectors built from a tag name,
//! `.class`, `[attr]` and `[attr="value"]`. That covers every lookup the
//! widgets make into their own templates.

use super::{Document, NodeId};

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Class(String),
    Has(String),
    Equals(String, String),
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Compound {
    tag: Option<String>,
    conditions: Vec<Condition>,
}

/// Parsed selector list
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    alternatives: Vec<Compound>,
}

impl Selector {
    /// Parse a selector list; `None` for anything outside the supported subset
    pub fn parse(input: &str) -> Option<Self> {
        let alternatives = input
            .split(',')
            .map(|part| parse_compound(part.trim()))
            .collect::<Option<Vec<_>>>()?;
        if alternatives.is_empty() {
            return None;
        }
        Some(Self { alternatives })
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(tag) = doc.tag(node) else {
            return false;
        };
        self.alternatives.iter().any(|compound| {
            compound.tag.as_deref().map_or(true, |t| t == tag)
                && compound.conditions.iter().all(|c| match c {
                    Condition::Class(class) => doc.has_class(node, class),
                    Condition::Has(name) => doc.has_attr(node, name),
                    Condition::Equals(name, value) => doc.attr(node, name) == Some(value.as_str()),
                })
        })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn parse_compound(input: &str) -> Option<Compound> {
    if input.is_empty() {
        return None;
    }
    let mut compound = Compound::default();
    let mut rest = input;

    let tag_len = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
    if tag_len > 0 {
        compound.tag = Some(rest[..tag_len].to_ascii_lowercase());
        rest = &rest[tag_len..];
    }

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let len = after.find(|c: char| !is_ident_char(c)).unwrap_or(after.len());
            if len == 0 {
                return None;
            }
            compound
                .conditions
                .push(Condition::Class(after[..len].to_string()));
            rest = &after[len..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']')?;
            let body = &after[..close];
            rest = &after[close + 1..];
            match body.split_once('=') {
                Some((name, value)) => {
                    let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
                    compound.conditions.push(Condition::Equals(
                        name.trim().to_string(),
                        value.to_string(),
                    ));
                }
                None => compound.conditions.push(Condition::Has(body.trim().to_string())),
            }
        } else {
            return None;
        }
    }
    Some(compound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compound_selector() {
        let mut doc = Document::new();
        let input = doc.create_element("input");
        doc.set_attr(input, "role", "combobox");
        doc.set_attr(input, "class", "rs__input wide");
        doc.append_child(doc.body(), input);

        let matching = Selector::parse(r#"input[role="combobox"].wide"#).unwrap();
        let other_role = Selector::parse("input[role='listbox']").unwrap();
        let list = Selector::parse("ul, input[role]").unwrap();

        assert!(matching.matches(&doc, input));
        assert!(!other_role.matches(&doc, input));
        assert!(list.matches(&doc, input));
    }

    #[test]
    fn test_unsupported_syntax_is_rejected() {
        assert!(Selector::parse("div > span").is_none());
        assert!(Selector::parse("").is_none());
        assert!(Selector::parse("[unterminated").is_none());
    }
}
