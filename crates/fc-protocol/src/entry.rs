//! Formatting of chat entries.
//!
//! Entries travel as a single `"author: text"` string. Ownership is decided by
//! comparing the author prefix with a session's display name; nothing on the
//! wire vouches for it.

use crate::ChatEntry;

/// Separator between author and text in a formatted entry.
pub const AUTHOR_SEPARATOR: &str = ": ";

/// Render an entry the canonical way.
pub fn format_entry(author: &str, text: &str) -> String {
    format!("{author}{AUTHOR_SEPARATOR}{text}")
}

/// Split a formatted entry at the first separator.
///
/// A string without a separator is all author and no text.
pub fn split_entry(message: &str) -> (&str, &str) {
    message
        .split_once(AUTHOR_SEPARATOR)
        .unwrap_or((message, ""))
}

impl ChatEntry {
    /// Build an append request; the relay assigns the id.
    pub fn draft(author: &str, text: &str) -> Self {
        Self {
            id: 0,
            message: format_entry(author, text),
        }
    }

    pub fn author(&self) -> &str {
        split_entry(&self.message).0
    }

    pub fn text(&self) -> &str {
        split_entry(&self.message).1
    }

    pub fn is_authored_by(&self, display_name: &str) -> bool {
        self.author() == display_name
    }
}
