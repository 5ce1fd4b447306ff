//! Content hashing for syncable items.
//!
//! Records hash their canonical (sorted-key, whitespace-free) JSON; attachment
//! files hash their bytes.

use std::path::Path;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::{Attachment, Entry, Journal};

use super::document::{EntryDocument, JournalDocument};

fn write_canonical(value: &Value, out: &mut String) -> Result<()> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Number(number) => out.push_str(&number.to_string()),
        Value::String(text) => out.push_str(&serde_json::to_string(text)?),
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (index, key) in keys.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(&map[*key], out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

/// Deterministic JSON encoding with object keys sorted at every level
pub fn canonical_json(value: &Value) -> Result<String> {
    let mut out = String::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

/// Lowercase hex SHA-256 of `bytes`
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn hash_record(mut value: Value, excluded: &[&str]) -> Result<String> {
    if let Value::Object(map) = &mut value {
        for key in excluded {
            map.remove(*key);
        }
    }
    Ok(sha256_hex(canonical_json(&value)?.as_bytes()))
}

/// Hash of a journal's syncable fields; `updatedAt` does not count as content
pub fn hash_journal(journal: &Journal) -> Result<String> {
    let value = serde_json::to_value(JournalDocument::from(journal))?;
    hash_record(value, &["updatedAt"])
}

/// Hash of an entry document: the entry's fields plus the metadata of the
/// attachments it carries, so a new attachment republishes its entry
pub fn hash_entry(entry: &Entry, attachments: &[Attachment]) -> Result<String> {
    let mut attachments = attachments.to_vec();
    attachments.sort_by_key(|attachment| attachment.id);
    let value = serde_json::to_value(EntryDocument::new(entry, attachments))?;
    hash_record(value, &["updatedAt"])
}

/// Hash of an attachment's file bytes.
///
/// A missing or unreadable file falls back to hashing the metadata tuple
/// (id, file name, size, MIME type, creation time).
#[must_use]
pub fn hash_attachment(attachment: &Attachment, attachments_dir: &Path) -> String {
    let bytes = attachment
        .local_path(attachments_dir)
        .and_then(|path| std::fs::read(path).map_err(Into::into));
    match bytes {
        Ok(bytes) => sha256_hex(&bytes),
        Err(error) => {
            tracing::warn!(
                attachment_id = %attachment.id,
                file_name = %attachment.file_name,
                "Attachment file unreadable, hashing metadata instead: {error}"
            );
            hash_attachment_metadata(attachment)
        }
    }
}

/// Metadata fallback hash for attachments without readable bytes
#[must_use]
pub fn hash_attachment_metadata(attachment: &Attachment) -> String {
    let tuple = format!(
        "{}\n{}\n{}\n{}\n{}",
        attachment.id,
        attachment.file_name,
        attachment.size_bytes,
        attachment.mime_type,
        attachment.created_at
    );
    sha256_hex(tuple.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryId, JournalId};
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn canonical_json_sorts_keys_recursively() {
        let value = json!({"b": 1, "a": {"d": [true, null], "c": "x"}});
        assert_eq!(
            canonical_json(&value).unwrap(),
            r#"{"a":{"c":"x","d":[true,null]},"b":1}"#
        );
    }

    #[test]
    fn sha256_hex_matches_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn entry_hash_is_stable_and_ignores_updated_at() {
        let mut entry = Entry::new(JournalId::new(), Some("Day".to_string()), "Body");
        let first = hash_entry(&entry, &[]).unwrap();
        assert_eq!(first, hash_entry(&entry.clone(), &[]).unwrap());
        assert_eq!(first.len(), 64);

        entry.updated_at += 1_000;
        assert_eq!(first, hash_entry(&entry, &[]).unwrap());

        entry.content.push('!');
        assert_ne!(first, hash_entry(&entry, &[]).unwrap());
    }

    #[test]
    fn entry_hash_covers_attachment_metadata_in_any_order() {
        let entry = Entry::new(JournalId::new(), None, "Body");
        let first =
            Attachment::new(entry.id, entry.journal_id, "a.txt", "text/plain", 1).unwrap();
        let second =
            Attachment::new(entry.id, entry.journal_id, "b.txt", "text/plain", 2).unwrap();

        let bare = hash_entry(&entry, &[]).unwrap();
        let with_one = hash_entry(&entry, &[first.clone()]).unwrap();
        assert_ne!(bare, with_one);
        assert_eq!(
            hash_entry(&entry, &[first.clone(), second.clone()]).unwrap(),
            hash_entry(&entry, &[second, first]).unwrap()
        );
    }

    #[test]
    fn journal_hash_ignores_local_position() {
        let mut journal = Journal::new("Travel", None).unwrap();
        let before = hash_journal(&journal).unwrap();
        journal.position = 12;
        assert_eq!(before, hash_journal(&journal).unwrap());
    }

    #[test]
    fn attachment_hash_uses_bytes_then_falls_back() {
        let dir = tempdir().unwrap();
        let attachment =
            Attachment::new(EntryId::new(), JournalId::new(), "a.txt", "text/plain", 5).unwrap();

        std::fs::write(dir.path().join(&attachment.file_name), b"hello").unwrap();
        assert_eq!(hash_attachment(&attachment, dir.path()), sha256_hex(b"hello"));

        std::fs::remove_file(dir.path().join(&attachment.file_name)).unwrap();
        assert_eq!(
            hash_attachment(&attachment, dir.path()),
            hash_attachment_metadata(&attachment)
        );
    }

    #[test]
    fn attachment_hash_never_reads_outside_directory() {
        let root = tempdir().unwrap();
        let dir = root.path().join("attachments");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(root.path().join("outside.txt"), b"secret").unwrap();

        let mut attachment =
            Attachment::new(EntryId::new(), JournalId::new(), "a.txt", "text/plain", 6).unwrap();
        attachment.file_name = "../outside.txt".to_string();
        assert_eq!(
            hash_attachment(&attachment, &dir),
            hash_attachment_metadata(&attachment)
        );
    }
}
