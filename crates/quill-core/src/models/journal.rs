//! Journal model

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{normalize_text_option, unix_millis_now};

use super::id::uuid_id;

uuid_id!(
    /// A unique identifier for a journal
    JournalId
);

/// A journal groups entries; it is the unit of sync opt-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    /// Unique identifier
    pub id: JournalId,
    /// Display name
    pub name: String,
    /// Optional longer description
    pub description: Option<String>,
    /// Optional accent color (e.g. `#aabbcc`)
    pub color: Option<String>,
    /// Local sidebar ordering, never synced
    pub position: i64,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl Journal {
    /// Create a new journal with the given name
    pub fn new(name: impl Into<String>, description: Option<String>) -> Result<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidInput(
                "Journal name cannot be empty".to_string(),
            ));
        }

        let now = unix_millis_now();
        Ok(Self {
            id: JournalId::new(),
            name,
            description: normalize_text_option(description),
            color: None,
            position: 0,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_id_parse() {
        let id = JournalId::new();
        let parsed: JournalId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_journal_new() {
        let journal = Journal::new(" Travel ", Some("  ".to_string())).unwrap();
        assert_eq!(journal.name, "Travel");
        assert_eq!(journal.description, None);
        assert_eq!(journal.created_at, journal.updated_at);
    }

    #[test]
    fn test_journal_requires_name() {
        assert!(Journal::new("   ", None).is_err());
    }
}
