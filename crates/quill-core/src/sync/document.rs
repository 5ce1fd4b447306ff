//! JSON documents stored on the server for journals and entries.

use serde::{Deserialize, Serialize};

use crate::models::{Attachment, Entry, EntryId, Journal, JournalId};

/// Syncable fields of a journal; local ordering is left out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalDocument {
    /// Journal id
    pub id: JournalId,
    /// Display name
    pub name: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
    /// Optional accent color
    #[serde(default)]
    pub color: Option<String>,
    /// Creation time (Unix ms)
    pub created_at: i64,
    /// Last update (Unix ms)
    pub updated_at: i64,
}

impl From<&Journal> for JournalDocument {
    fn from(journal: &Journal) -> Self {
        Self {
            id: journal.id,
            name: journal.name.clone(),
            description: journal.description.clone(),
            color: journal.color.clone(),
            created_at: journal.created_at,
            updated_at: journal.updated_at,
        }
    }
}

impl JournalDocument {
    /// Materialize as a journal, keeping a local `position`
    #[must_use]
    pub fn into_journal(self, position: i64) -> Journal {
        Journal {
            id: self.id,
            name: self.name,
            description: self.description,
            color: self.color,
            position,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// An entry plus the metadata of its attachments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDocument {
    /// Entry id
    pub id: EntryId,
    /// Owning journal
    pub journal_id: JournalId,
    /// Optional title
    #[serde(default)]
    pub title: Option<String>,
    /// Body
    pub content: String,
    /// Optional mood label
    #[serde(default)]
    pub mood: Option<String>,
    /// Creation time (Unix ms)
    pub created_at: i64,
    /// Last update (Unix ms)
    pub updated_at: i64,
    /// Attachment metadata, so rows exist before the bytes arrive
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl EntryDocument {
    /// Build a document from an entry and its attachments
    #[must_use]
    pub fn new(entry: &Entry, attachments: Vec<Attachment>) -> Self {
        Self {
            id: entry.id,
            journal_id: entry.journal_id,
            title: entry.title.clone(),
            content: entry.content.clone(),
            mood: entry.mood.clone(),
            created_at: entry.created_at,
            updated_at: entry.updated_at,
            attachments,
        }
    }

    /// Split into the entry and its attachment metadata
    #[must_use]
    pub fn into_parts(self) -> (Entry, Vec<Attachment>) {
        let entry = Entry {
            id: self.id,
            journal_id: self.journal_id,
            title: self.title,
            content: self.content,
            mood: self.mood,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        (entry, self.attachments)
    }
}
