//! Applies a change set against the server and the local database.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::models::{AttachmentId, EntryId, JournalId};
use crate::services::DatabaseService;
use crate::webdav::{RetryPolicy, WebDavClient, WebDavError};

use super::document::{EntryDocument, JournalDocument};
use super::error::{SyncError, SyncResult};
use super::manifest::{ItemKey, ItemType, SyncItem};
use super::paths::ancestors;
use super::status::StatusReporter;

/// A single item that could not be transferred
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Item involved
    pub key: ItemKey,
    /// What went wrong
    pub message: String,
}

/// Outcome of one upload or download pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseReport {
    /// Items now identical on both sides
    pub transferred: Vec<SyncItem>,
    /// Items deliberately left alone
    pub skipped: Vec<ItemKey>,
    /// Items that failed
    pub failures: Vec<ItemFailure>,
}

impl PhaseReport {
    /// Whether the phase had work and none of it succeeded
    #[must_use]
    pub fn all_failed(&self) -> bool {
        !self.failures.is_empty() && self.transferred.is_empty() && self.skipped.is_empty()
    }
}

enum Transfer {
    Done,
    Skipped(String),
}

enum ItemError {
    Remote(WebDavError),
    Local(String),
}

impl From<WebDavError> for ItemError {
    fn from(error: WebDavError) -> Self {
        Self::Remote(error)
    }
}

impl From<crate::Error> for ItemError {
    fn from(error: crate::Error) -> Self {
        Self::Local(error.to_string())
    }
}

impl From<serde_json::Error> for ItemError {
    fn from(error: serde_json::Error) -> Self {
        Self::Local(format!("Invalid document: {error}"))
    }
}

impl From<std::io::Error> for ItemError {
    fn from(error: std::io::Error) -> Self {
        Self::Local(error.to_string())
    }
}

fn parse_id<T: std::str::FromStr>(item: &SyncItem) -> Result<T, ItemError> {
    item.item_id
        .parse()
        .map_err(|_| ItemError::Local(format!("Invalid {} id: {}", item.item_type, item.item_id)))
}

/// Moves items between the server and the local store for one run.
pub struct TransferExecutor<'a> {
    client: &'a dyn WebDavClient,
    db: &'a DatabaseService,
    attachments_dir: &'a Path,
    retry: &'a RetryPolicy,
    cancel: &'a AtomicBool,
    reporter: &'a StatusReporter,
    include_attachments: bool,
    created_dirs: HashSet<String>,
}

impl<'a> TransferExecutor<'a> {
    /// Create an executor for one run
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: &'a dyn WebDavClient,
        db: &'a DatabaseService,
        attachments_dir: &'a Path,
        retry: &'a RetryPolicy,
        cancel: &'a AtomicBool,
        reporter: &'a StatusReporter,
        include_attachments: bool,
    ) -> Self {
        Self {
            client,
            db,
            attachments_dir,
            retry,
            cancel,
            reporter,
            include_attachments,
            created_dirs: HashSet::new(),
        }
    }

    fn check_cancelled(&self) -> SyncResult<()> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    /// Upload every item, recording per-item failures.
    ///
    /// Cancellation is observed between items; authentication errors abort.
    pub async fn upload_all(&mut self, items: &[SyncItem]) -> SyncResult<PhaseReport> {
        let mut report = PhaseReport::default();
        for item in items {
            self.check_cancelled()?;
            self.reporter
                .begin_item(format!("Uploading {} {}", item.item_type, item.item_id));
            let outcome = self.upload(item).await;
            Self::record(&mut report, item, outcome, "upload")?;
            self.reporter.finish_item();
        }
        Ok(report)
    }

    /// Download every item, recording per-item failures.
    ///
    /// Cancellation is observed between items; authentication errors abort.
    pub async fn download_all(&mut self, items: &[SyncItem]) -> SyncResult<PhaseReport> {
        let mut report = PhaseReport::default();
        for item in items {
            self.check_cancelled()?;
            self.reporter
                .begin_item(format!("Downloading {} {}", item.item_type, item.item_id));
            let outcome = self.download(item).await;
            Self::record(&mut report, item, outcome, "download")?;
            self.reporter.finish_item();
        }
        Ok(report)
    }

    fn record(
        report: &mut PhaseReport,
        item: &SyncItem,
        outcome: Result<Transfer, ItemError>,
        direction: &str,
    ) -> SyncResult<()> {
        match outcome {
            Ok(Transfer::Done) => {
                tracing::debug!(item = %item.key(), direction, "Transferred item");
                report.transferred.push(item.clone());
            }
            Ok(Transfer::Skipped(reason)) => {
                tracing::warn!(item = %item.key(), direction, "Skipped item: {reason}");
                report.skipped.push(item.key());
            }
            Err(ItemError::Remote(error)) if error.is_auth() => return Err(error.into()),
            Err(ItemError::Remote(error)) => {
                tracing::warn!(item = %item.key(), direction, "Item transfer failed: {error}");
                report.failures.push(ItemFailure {
                    key: item.key(),
                    message: error.to_string(),
                });
            }
            Err(ItemError::Local(message)) => {
                tracing::warn!(item = %item.key(), direction, "Item transfer failed: {message}");
                report.failures.push(ItemFailure {
                    key: item.key(),
                    message,
                });
            }
        }
        Ok(())
    }

    async fn ensure_parent_dirs(&mut self, path: &str) -> Result<(), WebDavError> {
        let client = self.client;
        for dir in ancestors(path) {
            if self.created_dirs.contains(&dir) {
                continue;
            }
            let target = dir.as_str();
            match self.retry.run("mkdir", move || client.mkdir(target)).await {
                Ok(()) | Err(WebDavError::AlreadyExists(_)) => {}
                Err(error) => return Err(error),
            }
            self.created_dirs.insert(dir);
        }
        Ok(())
    }

    async fn upload(&mut self, item: &SyncItem) -> Result<Transfer, ItemError> {
        let bytes = match item.item_type {
            ItemType::Journal => {
                let id: JournalId = parse_id(item)?;
                let Some(journal) = self.db.get_journal(&id).await? else {
                    return Ok(Transfer::Skipped("journal no longer exists locally".into()));
                };
                serde_json::to_vec_pretty(&JournalDocument::from(&journal))?
            }
            ItemType::Entry => {
                let id: EntryId = parse_id(item)?;
                let Some(entry) = self.db.get_entry(&id).await? else {
                    return Ok(Transfer::Skipped("entry no longer exists locally".into()));
                };
                let attachments = if self.include_attachments {
                    self.db.list_entry_attachments(&entry.id).await?
                } else {
                    Vec::new()
                };
                serde_json::to_vec_pretty(&EntryDocument::new(&entry, attachments))?
            }
            ItemType::Attachment => {
                let id: AttachmentId = parse_id(item)?;
                let Some(attachment) = self.db.get_attachment(&id).await? else {
                    return Ok(Transfer::Skipped("attachment no longer exists locally".into()));
                };
                let path = match attachment.local_path(self.attachments_dir) {
                    Ok(path) => path,
                    Err(error) => return Ok(Transfer::Skipped(error.to_string())),
                };
                match std::fs::read(path) {
                    Ok(bytes) => bytes,
                    Err(error) => {
                        return Ok(Transfer::Skipped(format!("local file unavailable: {error}")))
                    }
                }
            }
        };

        self.ensure_parent_dirs(&item.remote_path).await?;

        let client = self.client;
        let path = item.remote_path.as_str();
        self.retry
            .run("write", move || client.write(path, bytes.clone()))
            .await?;
        Ok(Transfer::Done)
    }

    async fn download(&mut self, item: &SyncItem) -> Result<Transfer, ItemError> {
        let client = self.client;
        let path = item.remote_path.as_str();
        let bytes = self.retry.run("read", move || client.read(path)).await?;

        match item.item_type {
            ItemType::Journal => {
                let document: JournalDocument = serde_json::from_slice(&bytes)?;
                if document.id.to_string() != item.item_id {
                    return Err(ItemError::Local("document id does not match manifest".into()));
                }
                let position = self
                    .db
                    .get_journal(&document.id)
                    .await?
                    .map_or(0, |existing| existing.position);
                self.db
                    .upsert_journal(&document.into_journal(position))
                    .await?;
            }
            ItemType::Entry => {
                let document: EntryDocument = serde_json::from_slice(&bytes)?;
                if document.id.to_string() != item.item_id
                    || document.journal_id.to_string() != item.journal_id
                {
                    return Err(ItemError::Local("document does not match manifest".into()));
                }
                let (entry, attachments) = document.into_parts();
                let attachments: Vec<_> = if self.include_attachments {
                    attachments
                        .into_iter()
                        .filter(|attachment| attachment.entry_id == entry.id)
                        .collect()
                } else {
                    Vec::new()
                };
                for attachment in &attachments {
                    attachment.local_path(self.attachments_dir)?;
                }
                self.db.upsert_entry(&entry).await?;
                for attachment in &attachments {
                    self.db.upsert_attachment(attachment).await?;
                }
            }
            ItemType::Attachment => {
                let id: AttachmentId = parse_id(item)?;
                let Some(attachment) = self.db.get_attachment(&id).await? else {
                    return Err(ItemError::Local(
                        "attachment metadata has not been synced yet".into(),
                    ));
                };
                write_atomically(&attachment.local_path(self.attachments_dir)?, &bytes)?;
            }
        }

        Ok(Transfer::Done)
    }
}

/// Write through a temporary sibling and rename into place.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}
