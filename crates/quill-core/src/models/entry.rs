//! Journal entry model

use serde::{Deserialize, Serialize};

use crate::util::{normalize_text_option, unix_millis_now};

use super::id::uuid_id;
use super::journal::JournalId;

uuid_id!(
    /// A unique identifier for a journal entry
    EntryId
);

/// A single journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique identifier
    pub id: EntryId,
    /// Owning journal
    pub journal_id: JournalId,
    /// Optional headline
    pub title: Option<String>,
    /// Entry body
    pub content: String,
    /// Optional free-form mood label
    pub mood: Option<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl Entry {
    /// Create a new entry in the given journal
    #[must_use]
    pub fn new(journal_id: JournalId, title: Option<String>, content: impl Into<String>) -> Self {
        let now = unix_millis_now();
        Self {
            id: EntryId::new(),
            journal_id,
            title: normalize_text_option(title),
            content: content.into(),
            mood: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Title if present, otherwise the first line of the content, truncated to `max_len`
    #[must_use]
    pub fn headline(&self, max_len: usize) -> String {
        self.title
            .as_deref()
            .unwrap_or_else(|| self.content.lines().next().unwrap_or(""))
            .chars()
            .take(max_len)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_new() {
        let entry = Entry::new(JournalId::new(), None, "Dear diary");
        assert_eq!(entry.content, "Dear diary");
        assert!(entry.created_at > 0);
        assert_eq!(entry.created_at, entry.updated_at);
    }

    #[test]
    fn test_headline_prefers_title() {
        let titled = Entry::new(JournalId::new(), Some("Trip".to_string()), "Day one\nmore");
        assert_eq!(titled.headline(10), "Trip");

        let untitled = Entry::new(JournalId::new(), None, "Day one\nmore");
        assert_eq!(untitled.headline(3), "Day");
    }
}
