//! Remote path layout under the fixed base collection.

use crate::models::{Attachment, Entry, JournalId, SyncConfigId};
use crate::util::date_parts;

/// Root collection for all synced data
pub const BASE_PATH: &str = "/journal_app";

/// `/journal_app/journals/{journalId}.json`
#[must_use]
pub fn journal_path(journal_id: &JournalId) -> String {
    format!("{BASE_PATH}/journals/{journal_id}.json")
}

/// `/journal_app/entries/{yyyy}/{mm}/{entryId}.json`, partitioned by creation date
#[must_use]
pub fn entry_path(entry: &Entry) -> String {
    let (year, month, _) = date_parts(entry.created_at);
    format!("{BASE_PATH}/entries/{year}/{month}/{}.json", entry.id)
}

/// `/journal_app/attachments/{yyyy}/{mm}/{dd}/{fileName}`, partitioned by creation date
#[must_use]
pub fn attachment_path(attachment: &Attachment) -> String {
    let (year, month, day) = date_parts(attachment.created_at);
    format!(
        "{BASE_PATH}/attachments/{year}/{month}/{day}/{}",
        attachment.file_name
    )
}

/// `/journal_app/{configId}_manifest.json`
#[must_use]
pub fn manifest_path(config_id: &SyncConfigId) -> String {
    format!("{BASE_PATH}/{config_id}_manifest.json")
}

/// Scratch collection used by connection tests
#[must_use]
pub fn probe_dir(token: &str) -> String {
    format!("{BASE_PATH}/.quill-probe-{token}")
}

/// Collections that must exist before `path` can be written, outermost first.
#[must_use]
pub fn ancestors(path: &str) -> Vec<String> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((_, dirs)) = segments.split_last() else {
        return Vec::new();
    };

    dirs.iter()
        .scan(String::new(), |prefix, segment| {
            prefix.push('/');
            prefix.push_str(segment);
            Some(prefix.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // 2024-01-05T10:00:00Z
    const JAN_5_2024: i64 = 1_704_448_800_000;

    #[test]
    fn entry_path_uses_creation_month() {
        let mut entry = Entry::new(JournalId::new(), None, "hi");
        entry.created_at = JAN_5_2024;
        entry.updated_at = JAN_5_2024 + 40 * 24 * 60 * 60 * 1000;

        assert_eq!(
            entry_path(&entry),
            format!("/journal_app/entries/2024/01/{}.json", entry.id)
        );
    }

    #[test]
    fn attachment_path_uses_creation_day() {
        let mut attachment = crate::models::Attachment::new(
            crate::models::EntryId::new(),
            JournalId::new(),
            "photo.png",
            "image/png",
            3,
        )
        .unwrap();
        attachment.created_at = JAN_5_2024;

        assert_eq!(
            attachment_path(&attachment),
            format!("/journal_app/attachments/2024/01/05/{}", attachment.file_name)
        );
    }

    #[test]
    fn manifest_path_is_per_config() {
        let id = SyncConfigId::new();
        assert_eq!(manifest_path(&id), format!("/journal_app/{id}_manifest.json"));
    }

    #[test]
    fn ancestors_excludes_root_and_file() {
        assert_eq!(
            ancestors("/journal_app/entries/2024/01/e.json"),
            vec![
                "/journal_app".to_string(),
                "/journal_app/entries".to_string(),
                "/journal_app/entries/2024".to_string(),
                "/journal_app/entries/2024/01".to_string(),
            ]
        );
        assert!(ancestors("/file.json").is_empty());
        assert!(ancestors("/").is_empty());
    }
}
