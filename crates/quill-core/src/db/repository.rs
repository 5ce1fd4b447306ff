//! Journal, entry and attachment repository implementation

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::models::{Attachment, AttachmentId, Entry, EntryId, Journal, JournalId};
use crate::util::unix_millis_now;
use rusqlite::{params, types::Type, Connection, OptionalExtension};

/// Trait for journal data storage operations.
///
/// Every read that the sync engine performs is scoped by journal id so that
/// journals outside a sync target's opt-in set are never loaded.
pub trait JournalRepository {
    /// Insert a new journal
    fn insert_journal(&self, journal: &Journal) -> Result<()>;

    /// Get a journal by ID
    fn get_journal(&self, id: &JournalId) -> Result<Option<Journal>>;

    /// List all journals in sidebar order
    fn list_journals(&self) -> Result<Vec<Journal>>;

    /// Insert or replace a journal's synced fields, keeping local-only columns
    fn upsert_journal(&self, journal: &Journal) -> Result<()>;

    /// Insert a new entry
    fn insert_entry(&self, entry: &Entry) -> Result<()>;

    /// Get an entry by ID
    fn get_entry(&self, id: &EntryId) -> Result<Option<Entry>>;

    /// List entries of one journal, newest first
    fn list_entries(&self, journal_id: &JournalId) -> Result<Vec<Entry>>;

    /// Update an entry's title and content, bumping `updated_at`
    fn update_entry(&self, id: &EntryId, title: Option<&str>, content: &str) -> Result<Entry>;

    /// Insert or replace an entry
    fn upsert_entry(&self, entry: &Entry) -> Result<()>;

    /// Insert attachment metadata
    fn insert_attachment(&self, attachment: &Attachment) -> Result<()>;

    /// Get attachment metadata by ID
    fn get_attachment(&self, id: &AttachmentId) -> Result<Option<Attachment>>;

    /// List attachment metadata of one journal
    fn list_attachments(&self, journal_id: &JournalId) -> Result<Vec<Attachment>>;

    /// List attachment metadata of one entry
    fn list_entry_attachments(&self, entry_id: &EntryId) -> Result<Vec<Attachment>>;

    /// Insert or replace attachment metadata
    fn upsert_attachment(&self, attachment: &Attachment) -> Result<()>;
}

/// `SQLite` implementation of `JournalRepository`
pub struct SqliteJournalRepository<'a> {
    conn: &'a Connection,
}

const JOURNAL_COLUMNS: &str = "id, name, description, color, position, created_at, updated_at";
const ENTRY_COLUMNS: &str = "id, journal_id, title, content, mood, created_at, updated_at";
const ATTACHMENT_COLUMNS: &str =
    "id, entry_id, journal_id, file_name, mime_type, size_bytes, created_at";

impl<'a> SqliteJournalRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_journal(row: &rusqlite::Row<'_>) -> rusqlite::Result<Journal> {
        Ok(Journal {
            id: parse_id(row, 0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            color: row.get(3)?,
            position: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entry> {
        Ok(Entry {
            id: parse_id(row, 0)?,
            journal_id: parse_id(row, 1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            mood: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn parse_attachment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Attachment> {
        Ok(Attachment {
            id: parse_id(row, 0)?,
            entry_id: parse_id(row, 1)?,
            journal_id: parse_id(row, 2)?,
            file_name: row.get(3)?,
            mime_type: row.get(4)?,
            size_bytes: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

/// Parse a TEXT column into a typed identifier
pub(super) fn parse_id<T>(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(index)?;
    raw.parse()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error)))
}

impl JournalRepository for SqliteJournalRepository<'_> {
    fn insert_journal(&self, journal: &Journal) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO journals ({JOURNAL_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"),
            params![
                journal.id.as_str(),
                journal.name,
                journal.description,
                journal.color,
                journal.position,
                journal.created_at,
                journal.updated_at
            ],
        )?;
        Ok(())
    }

    fn get_journal(&self, id: &JournalId) -> Result<Option<Journal>> {
        let journal = self
            .conn
            .query_row(
                &format!("SELECT {JOURNAL_COLUMNS} FROM journals WHERE id = ?"),
                params![id.as_str()],
                Self::parse_journal,
            )
            .optional()?;
        Ok(journal)
    }

    fn list_journals(&self) -> Result<Vec<Journal>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {JOURNAL_COLUMNS} FROM journals ORDER BY position ASC, name COLLATE NOCASE ASC"
        ))?;

        let journals = stmt
            .query_map([], Self::parse_journal)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(journals)
    }

    fn upsert_journal(&self, journal: &Journal) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO journals ({JOURNAL_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    description = excluded.description,
                    color = excluded.color,
                    created_at = excluded.created_at,
                    updated_at = excluded.updated_at"
            ),
            params![
                journal.id.as_str(),
                journal.name,
                journal.description,
                journal.color,
                journal.position,
                journal.created_at,
                journal.updated_at
            ],
        )?;
        Ok(())
    }

    fn insert_entry(&self, entry: &Entry) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO entries ({ENTRY_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"),
            params![
                entry.id.as_str(),
                entry.journal_id.as_str(),
                entry.title,
                entry.content,
                entry.mood,
                entry.created_at,
                entry.updated_at
            ],
        )?;
        Ok(())
    }

    fn get_entry(&self, id: &EntryId) -> Result<Option<Entry>> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?"),
                params![id.as_str()],
                Self::parse_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn list_entries(&self, journal_id: &JournalId) -> Result<Vec<Entry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE journal_id = ? ORDER BY created_at DESC"
        ))?;

        let entries = stmt
            .query_map(params![journal_id.as_str()], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    fn update_entry(&self, id: &EntryId, title: Option<&str>, content: &str) -> Result<Entry> {
        let now = unix_millis_now();

        let rows = self.conn.execute(
            "UPDATE entries SET title = ?, content = ?, updated_at = ? WHERE id = ?",
            params![title, content, now, id.as_str()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        self.get_entry(id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn upsert_entry(&self, entry: &Entry) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO entries ({ENTRY_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    journal_id = excluded.journal_id,
                    title = excluded.title,
                    content = excluded.content,
                    mood = excluded.mood,
                    created_at = excluded.created_at,
                    updated_at = excluded.updated_at"
            ),
            params![
                entry.id.as_str(),
                entry.journal_id.as_str(),
                entry.title,
                entry.content,
                entry.mood,
                entry.created_at,
                entry.updated_at
            ],
        )?;
        Ok(())
    }

    fn insert_attachment(&self, attachment: &Attachment) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO attachments ({ATTACHMENT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"),
            params![
                attachment.id.as_str(),
                attachment.entry_id.as_str(),
                attachment.journal_id.as_str(),
                attachment.file_name,
                attachment.mime_type,
                attachment.size_bytes,
                attachment.created_at
            ],
        )?;
        Ok(())
    }

    fn get_attachment(&self, id: &AttachmentId) -> Result<Option<Attachment>> {
        let attachment = self
            .conn
            .query_row(
                &format!("SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE id = ?"),
                params![id.as_str()],
                Self::parse_attachment,
            )
            .optional()?;
        Ok(attachment)
    }

    fn list_attachments(&self, journal_id: &JournalId) -> Result<Vec<Attachment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE journal_id = ? ORDER BY created_at ASC"
        ))?;

        let attachments = stmt
            .query_map(params![journal_id.as_str()], Self::parse_attachment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(attachments)
    }

    fn list_entry_attachments(&self, entry_id: &EntryId) -> Result<Vec<Attachment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE entry_id = ? ORDER BY created_at ASC"
        ))?;

        let attachments = stmt
            .query_map(params![entry_id.as_str()], Self::parse_attachment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(attachments)
    }

    fn upsert_attachment(&self, attachment: &Attachment) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO attachments ({ATTACHMENT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    entry_id = excluded.entry_id,
                    journal_id = excluded.journal_id,
                    file_name = excluded.file_name,
                    mime_type = excluded.mime_type,
                    size_bytes = excluded.size_bytes,
                    created_at = excluded.created_at"
            ),
            params![
                attachment.id.as_str(),
                attachment.entry_id.as_str(),
                attachment.journal_id.as_str(),
                attachment.file_name,
                attachment.mime_type,
                attachment.size_bytes,
                attachment.created_at
            ],
        )?;
        Ok(())
    }
}
