//! Attachment model

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_plain_file_name, sanitize_file_name, unix_millis_now};

use super::entry::EntryId;
use super::id::uuid_id;
use super::journal::JournalId;

uuid_id!(
    /// A unique identifier for an attachment
    AttachmentId
);

/// Attachment metadata persisted for an entry.
///
/// The bytes live in the attachment directory under `file_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Unique attachment identifier.
    pub id: AttachmentId,
    /// Parent entry identifier.
    pub entry_id: EntryId,
    /// Journal owning the parent entry.
    pub journal_id: JournalId,
    /// Stored file name, unique per attachment.
    pub file_name: String,
    /// Content MIME type.
    pub mime_type: String,
    /// Attachment size in bytes.
    pub size_bytes: i64,
    /// Creation timestamp (Unix ms).
    pub created_at: i64,
}

impl Attachment {
    /// Create a new attachment metadata record.
    ///
    /// The stored file name is derived from the new id and the sanitized
    /// original name, so two uploads of `photo.jpg` never collide.
    pub fn new(
        entry_id: EntryId,
        journal_id: JournalId,
        original_name: &str,
        mime_type: impl Into<String>,
        size_bytes: i64,
    ) -> Result<Self> {
        let mime_type = mime_type.into().trim().to_string();

        if original_name.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Attachment file name cannot be empty".to_string(),
            ));
        }
        if mime_type.is_empty() {
            return Err(Error::InvalidInput(
                "Attachment mime_type cannot be empty".to_string(),
            ));
        }
        if size_bytes < 0 {
            return Err(Error::InvalidInput(
                "Attachment size_bytes cannot be negative".to_string(),
            ));
        }

        let id = AttachmentId::new();
        let file_name = format!("{id}-{}", sanitize_file_name(original_name));

        Ok(Self {
            id,
            entry_id,
            journal_id,
            file_name,
            mime_type,
            size_bytes,
            created_at: unix_millis_now(),
        })
    }

    /// Location of the bytes inside `attachments_dir`.
    ///
    /// Names that would resolve outside the directory are rejected.
    pub fn local_path(&self, attachments_dir: &Path) -> Result<PathBuf> {
        if !is_plain_file_name(&self.file_name) {
            return Err(Error::InvalidInput(format!(
                "Attachment file name is not a plain file name: {:?}",
                self.file_name
            )));
        }
        Ok(attachments_dir.join(&self.file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_new() {
        let attachment = Attachment::new(
            EntryId::new(),
            JournalId::new(),
            "Beach Day.JPG",
            "image/jpeg",
            1234,
        )
        .unwrap();

        assert!(attachment
            .file_name
            .starts_with(&attachment.id.to_string()));
        assert!(attachment.file_name.ends_with("-beach-day.jpg"));
        assert_eq!(attachment.mime_type, "image/jpeg");
        assert_eq!(attachment.size_bytes, 1234);
    }

    #[test]
    fn local_path_stays_inside_directory() {
        let mut attachment =
            Attachment::new(EntryId::new(), JournalId::new(), "a.txt", "text/plain", 1).unwrap();
        let dir = Path::new("/data/attachments");
        assert_eq!(
            attachment.local_path(dir).unwrap(),
            dir.join(&attachment.file_name)
        );

        attachment.file_name = "../escaped.txt".to_string();
        assert!(attachment.local_path(dir).is_err());
        attachment.file_name = "/tmp/escaped.txt".to_string();
        assert!(attachment.local_path(dir).is_err());
    }

    #[test]
    fn test_attachment_validation() {
        let entry_id = EntryId::new();
        let journal_id = JournalId::new();

        assert!(Attachment::new(entry_id, journal_id, "", "image/png", 1).is_err());
        assert!(Attachment::new(entry_id, journal_id, "file", "", 1).is_err());
        assert!(Attachment::new(entry_id, journal_id, "file", "image/png", -1).is_err());
    }
}
