//! Text field editing and inline typeahead
//!
//! Positions are char indices, never byte offsets, so labels like
//! "Ærø" edit correctly.

use super::options::ComboOption;
use std::ops::Range;

/// How the last edit changed the text, named after DOM input types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    InsertText,
    DeleteContentBackward,
    DeleteContentForward,
    /// Text replaced wholesale (paste, programmatic set)
    InsertReplacementText,
}

impl EditKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsertText => "insertText",
            Self::DeleteContentBackward => "deleteContentBackward",
            Self::DeleteContentForward => "deleteContentForward",
            Self::InsertReplacementText => "insertReplacementText",
        }
    }
}

/// Single-line text with a selection; a collapsed selection is the caret
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextField {
    text: String,
    selection: Range<usize>,
}

impl TextField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn len(&self) -> usize {
        self.text.chars().count()
    }

    fn byte_at(&self, index: usize) -> usize {
        self.text
            .char_indices()
            .nth(index)
            .map_or(self.text.len(), |(byte, _)| byte)
    }

    pub fn selection(&self) -> Range<usize> {
        self.selection.clone()
    }

    pub fn has_selection(&self) -> bool {
        self.selection.start != self.selection.end
    }

    pub fn caret_at_end(&self) -> bool {
        let len = self.len();
        self.selection.start == len && self.selection.end == len
    }

    /// Replace the whole text, caret at the end
    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        let len = self.len();
        self.selection = len..len;
    }

    /// Select `start..end`, clamped to the text
    pub fn select(&mut self, start: usize, end: usize) {
        let len = self.len();
        let end = end.min(len);
        self.selection = start.min(end)..end;
    }

    fn replace_selection(&mut self, with: &str) {
        let start = self.byte_at(self.selection.start);
        let end = self.byte_at(self.selection.end);
        self.text.replace_range(start..end, with);
        let caret = self.selection.start + with.chars().count();
        self.selection = caret..caret;
    }

    /// Type a character over the selection
    pub fn insert(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.replace_selection(c.encode_utf8(&mut buf));
    }

    /// Backspace; returns whether the text changed
    pub fn backspace(&mut self) -> bool {
        if !self.has_selection() {
            if self.selection.start == 0 {
                return false;
            }
            self.selection.start -= 1;
        }
        self.replace_selection("");
        true
    }

    /// Forward delete; returns whether the text changed
    pub fn delete(&mut self) -> bool {
        if !self.has_selection() {
            if self.selection.end >= self.len() {
                return false;
            }
            self.selection.end += 1;
        }
        self.replace_selection("");
        true
    }

    /// Collapse the selection and move the caret
    pub fn move_caret(&mut self, forward: bool) {
        let caret = match (self.has_selection(), forward) {
            (true, true) => self.selection.end,
            (true, false) => self.selection.start,
            (false, true) => (self.selection.end + 1).min(self.len()),
            (false, false) => self.selection.start.saturating_sub(1),
        };
        self.selection = caret..caret;
    }
}

/// Decide whether inline completion must be skipped for this edit
///
/// `after_delete_key` is the one-shot flag raised by Backspace/Delete key
/// presses; it is consumed here.
pub fn should_suppress(after_delete_key: &mut bool, kind: &str, field: &TextField) -> bool {
    if std::mem::take(after_delete_key) {
        return true;
    }
    if kind.starts_with("delete") {
        return true;
    }
    field.has_selection() || !field.caret_at_end()
}

/// Complete `query` to the first option's label when it is a prefix of it,
/// selecting the completed tail so the next keystroke overwrites it
pub fn apply_typeahead(field: &mut TextField, query: &str, first: Option<&ComboOption>) -> bool {
    if query.is_empty() {
        return false;
    }
    let Some(first) = first else {
        return false;
    };
    if !first.label.to_lowercase().starts_with(&query.to_lowercase()) {
        return false;
    }
    field.set_text(&first.label);
    field.select(query.chars().count(), first.label.chars().count());
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(text: &str) -> TextField {
        let mut field = TextField::new();
        field.set_text(text);
        field
    }

    #[test]
    fn test_editing_with_multibyte_text() {
        let mut f = field("Ærø");
        f.move_caret(false);
        f.insert('x');
        assert_eq!(f.text(), "Ærxø");
        assert!(f.backspace());
        assert!(f.delete());
        assert_eq!(f.text(), "Ær");
        assert!(!f.delete());
        assert!(f.caret_at_end());
    }

    #[test]
    fn test_typing_replaces_completed_tail() {
        let apple = ComboOption::new("apple", "Apple");
        let mut f = field("a");
        assert!(apply_typeahead(&mut f, "a", Some(&apple)));
        assert_eq!(f.text(), "Apple");
        assert_eq!(f.selection(), 1..5);

        f.insert('p');
        assert_eq!(f.text(), "Ap");
        assert!(f.caret_at_end());
    }

    #[test]
    fn test_typeahead_requires_prefix_match() {
        let banana = ComboOption::new("banana", "Banana");
        let mut f = field("an");
        assert!(!apply_typeahead(&mut f, "an", Some(&banana)));
        assert!(!apply_typeahead(&mut f, "", Some(&banana)));
        assert!(!apply_typeahead(&mut f, "an", None));
        assert_eq!(f.text(), "an");
    }

    #[test]
    fn test_suppression_rules() {
        let plain = field("ap");

        let mut flag = true;
        assert!(should_suppress(&mut flag, "insertText", &plain));
        assert!(!flag, "flag is one-shot");

        assert!(should_suppress(&mut flag, "deleteContentBackward", &plain));
        assert!(should_suppress(&mut flag, "deleteWordBackward", &plain));

        let mut selected = field("apple");
        selected.select(2, 5);
        assert!(should_suppress(&mut flag, "insertText", &selected));

        let mut mid = field("apple");
        mid.move_caret(false);
        assert!(should_suppress(&mut flag, "insertText", &mid));

        assert!(!should_suppress(&mut flag, "insertText", &plain));
    }
}
