//! Sync orchestrator: one run per config, driven through the state machine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::credentials::CredentialStore;
use crate::models::{SyncConfig, SyncConfigId};
use crate::services::DatabaseService;
use crate::util::unix_millis_now;
use crate::webdav::{WebDavClient, WebDavConnector, WebDavError, WebDavResult};

use super::builder::{build_manifest, scope_to_config};
use super::conflict::{resolve, ConflictSide};
use super::error::{SyncError, SyncResult};
use super::executor::{ItemFailure, PhaseReport, TransferExecutor};
use super::manifest::SyncManifest;
use super::manifest_store::{fetch_remote, load_local, save_local, upload_remote};
use super::options::EngineOptions;
use super::paths::{probe_dir, BASE_PATH};
use super::reconcile::reconcile;
use super::status::{StatusReporter, SyncState, SyncStatus};

/// Summary of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Items written to the server, conflict winners included
    pub uploaded: usize,
    /// Items applied locally, conflict winners included
    pub downloaded: usize,
    /// Conflicts resolved by last-writer-wins
    pub conflicts_resolved: usize,
    /// Items identical on both sides
    pub unchanged: usize,
    /// Items deliberately left alone (e.g. attachment file missing)
    pub skipped: usize,
    /// Items that failed without failing the run
    pub failed: Vec<ItemFailure>,
}

impl SyncReport {
    /// Number of items moved in either direction
    #[must_use]
    pub const fn transferred(&self) -> usize {
        self.uploaded + self.downloaded
    }

    fn absorb(&mut self, phase: PhaseReport, side: ConflictSide) {
        match side {
            ConflictSide::Local => self.uploaded += phase.transferred.len(),
            ConflictSide::Remote => self.downloaded += phase.transferred.len(),
        }
        self.skipped += phase.skipped.len();
        self.failed.extend(phase.failures);
    }
}

/// Removes the run's lock entry when the run ends, however it ends.
///
/// A run dropped mid-flight (its future abandoned) is marked cancelled so the
/// next run can start from a terminal state.
struct RunGuard<'a> {
    runs: &'a Mutex<HashMap<SyncConfigId, Arc<AtomicBool>>>,
    config_id: SyncConfigId,
    cancel: Arc<AtomicBool>,
    reporter: StatusReporter,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.reporter.state().is_active() {
            tracing::warn!(config_id = %self.config_id, "Sync run abandoned before finishing");
            if let Err(error) = self.reporter.transition(SyncState::Cancelled) {
                tracing::debug!(config_id = %self.config_id, "Could not mark run cancelled: {error}");
            }
        }
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.config_id);
    }
}

/// Coordinates sync runs for every configured remote.
pub struct SyncEngine {
    db: DatabaseService,
    credentials: Arc<dyn CredentialStore>,
    connector: Arc<dyn WebDavConnector>,
    options: EngineOptions,
    runs: Mutex<HashMap<SyncConfigId, Arc<AtomicBool>>>,
    statuses: Mutex<HashMap<SyncConfigId, watch::Sender<SyncStatus>>>,
}

impl SyncEngine {
    /// Create an engine over a database, a secret store and a way to reach servers
    pub fn new(
        db: DatabaseService,
        credentials: Arc<dyn CredentialStore>,
        connector: Arc<dyn WebDavConnector>,
        options: EngineOptions,
    ) -> Self {
        Self {
            db,
            credentials,
            connector,
            options,
            runs: Mutex::new(HashMap::new()),
            statuses: Mutex::new(HashMap::new()),
        }
    }

    /// Database the engine reads and writes
    pub const fn db(&self) -> &DatabaseService {
        &self.db
    }

    /// Engine settings
    pub const fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn statuses(&self) -> MutexGuard<'_, HashMap<SyncConfigId, watch::Sender<SyncStatus>>> {
        self.statuses.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reporter(&self, config_id: SyncConfigId) -> StatusReporter {
        let sender = self
            .statuses()
            .entry(config_id)
            .or_insert_with(|| watch::channel(SyncStatus::idle(config_id)).0)
            .clone();
        StatusReporter::new(sender)
    }

    /// Latest status for a config, idle if it never ran
    pub fn status(&self, config_id: &SyncConfigId) -> SyncStatus {
        self.statuses()
            .get(config_id)
            .map_or_else(|| SyncStatus::idle(*config_id), |sender| sender.borrow().clone())
    }

    /// Observe status updates for a config
    pub fn subscribe(&self, config_id: SyncConfigId) -> watch::Receiver<SyncStatus> {
        self.statuses()
            .entry(config_id)
            .or_insert_with(|| watch::channel(SyncStatus::idle(config_id)).0)
            .subscribe()
    }

    /// Whether a run is in flight for a config
    pub fn is_running(&self, config_id: &SyncConfigId) -> bool {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(config_id)
    }

    /// Ask the active run for a config to stop at the next item boundary.
    ///
    /// Returns `false` when nothing is running.
    pub fn cancel_sync(&self, config_id: &SyncConfigId) -> bool {
        let runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(flag) = runs.get(config_id) else {
            return false;
        };
        flag.store(true, Ordering::SeqCst);
        tracing::info!(%config_id, "Sync cancellation requested");
        true
    }

    fn acquire(&self, config_id: SyncConfigId) -> SyncResult<RunGuard<'_>> {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        if runs.contains_key(&config_id) {
            return Err(SyncError::AlreadyRunning(config_id));
        }
        let cancel = Arc::new(AtomicBool::new(false));
        runs.insert(config_id, Arc::clone(&cancel));
        Ok(RunGuard {
            runs: &self.runs,
            config_id,
            cancel,
            reporter: self.reporter(config_id),
        })
    }

    /// Run `start_sync` on a background task
    pub fn spawn_sync(self: &Arc<Self>, config_id: SyncConfigId) -> JoinHandle<SyncResult<SyncReport>> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.start_sync(config_id).await })
    }

    /// Run one sync for `config_id` to completion.
    ///
    /// Configuration problems are returned before any state change. A second
    /// call while a run is active is rejected with `AlreadyRunning`.
    pub async fn start_sync(&self, config_id: SyncConfigId) -> SyncResult<SyncReport> {
        let config = self
            .db
            .get_sync_config(&config_id)
            .await?
            .ok_or(SyncError::ConfigNotFound(config_id))?;
        if !config.enabled {
            return Err(SyncError::Configuration(format!(
                "sync target '{}' is disabled",
                config.display_name
            )));
        }
        config
            .validate()
            .map_err(|error| SyncError::Configuration(error.to_string()))?;
        let password = self
            .credentials
            .password(&config_id)?
            .ok_or_else(|| {
                SyncError::Configuration("no password stored for this sync target".to_string())
            })?;

        let guard = self.acquire(config_id)?;
        let reporter = guard.reporter.clone();
        reporter.transition(SyncState::Checking)?;
        tracing::info!(%config_id, remote = %config.server_url, "Sync started");

        let result = self.run(&config, &password, &reporter, &guard.cancel).await;
        match &result {
            Ok(report) => tracing::info!(
                %config_id,
                uploaded = report.uploaded,
                downloaded = report.downloaded,
                conflicts = report.conflicts_resolved,
                failed = report.failed.len(),
                "Sync completed"
            ),
            Err(SyncError::Cancelled) => {
                tracing::info!(%config_id, "Sync cancelled");
                if let Err(error) = reporter.transition(SyncState::Cancelled) {
                    tracing::debug!(%config_id, "Could not mark run cancelled: {error}");
                }
            }
            Err(error) => {
                tracing::error!(%config_id, "Sync failed: {error}");
                if let Err(status_error) = reporter.fail(error.user_message()) {
                    tracing::debug!(%config_id, "Could not mark run failed: {status_error}");
                }
            }
        }
        drop(guard);
        result
    }

    fn check_cancelled(cancel: &AtomicBool) -> SyncResult<()> {
        if cancel.load(Ordering::SeqCst) {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    fn check_failures(&self, report: &SyncReport, phases: &[&PhaseReport]) -> SyncResult<()> {
        let threshold = self.options.max_failed_items();
        let failed = report.failed.len();
        if failed > threshold || phases.iter().any(|phase| phase.all_failed()) {
            return Err(SyncError::TooManyFailures { failed, threshold });
        }
        Ok(())
    }

    async fn run(
        &self,
        config: &SyncConfig,
        password: &str,
        reporter: &StatusReporter,
        cancel: &AtomicBool,
    ) -> SyncResult<SyncReport> {
        let config_id = config.id;
        let retry = self.options.retry();
        let client = self.connector.connect(config, password)?;
        let client: &dyn WebDavClient = client.as_ref();

        retry.run("ping", move || client.ping()).await?;
        if config.encrypt_data {
            tracing::warn!(
                %config_id,
                "Encryption is enabled for this target but not implemented; data is stored as plain JSON"
            );
        }
        Self::check_cancelled(cancel)?;

        let attachments_dir = self.options.attachments_dir();
        let manifest_file = self.options.manifest_file(&config_id);
        let started_at = unix_millis_now();

        let local_current = build_manifest(&self.db, config, &attachments_dir, started_at).await?;
        let stored_local = load_local(&manifest_file, &config_id);
        let baseline = stored_local.clone().map_or_else(
            || {
                tracing::info!(%config_id, "No local manifest, using current local state as baseline");
                local_current.clone()
            },
            |mut manifest| {
                scope_to_config(&mut manifest, config);
                manifest
            },
        );

        let remote_full = fetch_remote(client, retry, &config_id)
            .await?
            .unwrap_or_else(|| SyncManifest::new(config_id, started_at));
        let mut remote = remote_full.clone();
        scope_to_config(&mut remote, config);

        let changes = reconcile(&local_current, &baseline, &remote);
        tracing::info!(
            %config_id,
            uploads = changes.to_upload.len(),
            downloads = changes.to_download.len(),
            conflicts = changes.conflicts.len(),
            unchanged = changes.unchanged.len(),
            "Reconciled manifests"
        );
        reporter.add_total(changes.pending());

        let mut report = SyncReport {
            unchanged: changes.unchanged.len(),
            ..SyncReport::default()
        };
        let mut executor = TransferExecutor::new(
            client,
            &self.db,
            &attachments_dir,
            retry,
            cancel,
            reporter,
            config.sync_attachments,
        );

        let uploads = if changes.to_upload.is_empty() {
            PhaseReport::default()
        } else {
            reporter.transition(SyncState::Uploading)?;
            executor.upload_all(&changes.to_upload).await?
        };
        let downloads = if changes.to_download.is_empty() {
            PhaseReport::default()
        } else {
            reporter.transition(SyncState::Downloading)?;
            executor.download_all(&changes.to_download).await?
        };

        reporter.transition(SyncState::Syncing)?;
        let mut transferred = uploads.transferred.clone();
        transferred.extend(downloads.transferred.iter().cloned());
        let mut remote_updates = uploads.transferred.clone();
        report.absorb(uploads.clone(), ConflictSide::Local);
        report.absorb(downloads.clone(), ConflictSide::Remote);
        self.check_failures(&report, &[&uploads, &downloads])?;

        if !changes.conflicts.is_empty() {
            reporter.transition(SyncState::Resolving)?;
            let resolutions: Vec<_> = changes.conflicts.into_iter().map(resolve).collect();
            let (local_wins, remote_wins): (Vec<_>, Vec<_>) = resolutions
                .iter()
                .partition(|resolution| resolution.winner == ConflictSide::Local);
            let local_items: Vec<_> = local_wins.iter().map(|r| r.winning_item().clone()).collect();
            let remote_items: Vec<_> = remote_wins.iter().map(|r| r.winning_item().clone()).collect();

            let pushed = executor.upload_all(&local_items).await?;
            let pulled = executor.download_all(&remote_items).await?;

            let resolved_at = unix_millis_now();
            for resolution in &resolutions {
                tracing::info!(
                    %config_id,
                    item = %resolution.conflict.key(),
                    winner = %resolution.winner,
                    "Resolved conflict"
                );
                self.db
                    .record_conflict(&resolution.to_record(config_id, resolved_at))
                    .await?;
            }
            report.conflicts_resolved = resolutions.len();

            transferred.extend(pushed.transferred.iter().cloned());
            transferred.extend(pulled.transferred.iter().cloned());
            remote_updates.extend(pushed.transferred.iter().cloned());
            report.absorb(pushed.clone(), ConflictSide::Local);
            report.absorb(pulled.clone(), ConflictSide::Remote);
            self.check_failures(&report, &[&pushed, &pulled])?;
        }

        Self::check_cancelled(cancel)?;

        let mut next_remote = remote_full.clone();
        next_remote.generated_at = started_at;
        for item in remote_updates {
            next_remote.insert(item);
        }

        let mut next_local = baseline;
        next_local.generated_at = started_at;
        for item in changes.unchanged.into_iter().chain(transferred) {
            next_local.insert(item);
        }

        if !next_remote.same_items(&remote_full) {
            upload_remote(client, retry, &next_remote).await?;
        }
        if !stored_local.is_some_and(|stored| stored.same_items(&next_local)) {
            save_local(&manifest_file, &next_local)?;
        }

        self.db
            .set_last_sync_at(&config_id, unix_millis_now())
            .await?;
        reporter.transition(SyncState::Completed)?;
        Ok(report)
    }

    /// Check that `config` and `password` reach a writable server.
    ///
    /// Pings, then creates, writes, reads back and removes a scratch
    /// collection under the base path. Journal data is never touched.
    /// Server-side failures yield `Ok(false)`; an unusable config is an error.
    pub async fn test_connection(&self, config: &SyncConfig, password: &str) -> SyncResult<bool> {
        config
            .validate()
            .map_err(|error| SyncError::Configuration(error.to_string()))?;
        let client = self.connector.connect(config, password)?;

        match probe(client.as_ref()).await {
            Ok(true) => {
                tracing::info!(config_id = %config.id, "Connection test passed");
                Ok(true)
            }
            Ok(false) => {
                tracing::warn!(config_id = %config.id, "Connection test read back different bytes");
                Ok(false)
            }
            Err(error) => {
                tracing::warn!(config_id = %config.id, "Connection test failed: {error}");
                Ok(false)
            }
        }
    }
}

async fn probe(client: &dyn WebDavClient) -> WebDavResult<bool> {
    client.ping().await?;
    match client.mkdir(BASE_PATH).await {
        Ok(()) | Err(WebDavError::AlreadyExists(_)) => {}
        Err(error) => return Err(error),
    }

    let dir = probe_dir(&uuid::Uuid::now_v7().simple().to_string());
    client.mkdir(&dir).await?;

    let round_trip = write_and_read_back(client, &format!("{dir}/probe.txt")).await;

    if let Err(error) = client.remove(&dir).await {
        tracing::warn!(dir = %dir, "Failed to remove connection probe: {error}");
    }
    round_trip
}

async fn write_and_read_back(client: &dyn WebDavClient, path: &str) -> WebDavResult<bool> {
    let payload = b"quill connection test".to_vec();
    client.write(path, payload.clone()).await?;
    Ok(client.read(path).await? == payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::webdav::{MemoryConnector, MemoryWebDav, RetryPolicy};
    use tempfile::{tempdir, TempDir};

    struct Harness {
        engine: Arc<SyncEngine>,
        server: MemoryWebDav,
        config: SyncConfig,
        _dir: TempDir,
    }

    async fn harness() -> Harness {
        let dir = tempdir().unwrap();
        let db = DatabaseService::open_in_memory().unwrap();
        let journal = db.create_journal("Daily", None).await.unwrap();
        db.create_entry(&journal.id, None, "hello").await.unwrap();

        let config = SyncConfig::new("https://dav.example.com", "alice", "Home")
            .unwrap()
            .with_journal(journal.id);
        db.save_sync_config(&config).await.unwrap();

        let credentials = MemoryCredentialStore::new();
        credentials.set_password(&config.id, "secret").unwrap();

        let server = MemoryWebDav::new();
        let engine = SyncEngine::new(
            db,
            Arc::new(credentials),
            Arc::new(MemoryConnector::new(server.clone())),
            EngineOptions::new(dir.path()).with_retry(RetryPolicy::no_retry()),
        );

        Harness {
            engine: Arc::new(engine),
            server,
            config,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn first_run_uploads_and_completes() {
        let h = harness().await;
        let mut receiver = h.engine.subscribe(h.config.id);

        let report = h.engine.start_sync(h.config.id).await.unwrap();

        assert_eq!(report.uploaded, 2);
        assert_eq!(report.downloaded, 0);
        assert!(receiver.has_changed().unwrap());
        let status = receiver.borrow_and_update().clone();
        assert_eq!(status.state, SyncState::Completed);
        assert_eq!(status.completed_items, 2);
        assert!(!status.is_active);

        let stored = h.engine.db().get_sync_config(&h.config.id).await.unwrap().unwrap();
        assert!(stored.last_sync_at.is_some());
    }

    #[tokio::test]
    async fn abandoned_run_is_marked_cancelled_and_unlocked() {
        let h = harness().await;
        h.server
            .set_latency(Some(std::time::Duration::from_millis(50)));

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(120),
            h.engine.start_sync(h.config.id),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(!h.engine.is_running(&h.config.id));
        assert_eq!(h.engine.status(&h.config.id).state, SyncState::Cancelled);

        h.server.set_latency(None);
        h.engine.start_sync(h.config.id).await.unwrap();
        assert_eq!(h.engine.status(&h.config.id).state, SyncState::Completed);
    }

    #[tokio::test]
    async fn configuration_errors_never_start_a_run() {
        let h = harness().await;

        assert!(matches!(
            h.engine.start_sync(SyncConfigId::new()).await,
            Err(SyncError::ConfigNotFound(_))
        ));

        let mut disabled = h.config.clone();
        disabled.enabled = false;
        h.engine.db().save_sync_config(&disabled).await.unwrap();
        assert!(matches!(
            h.engine.start_sync(h.config.id).await,
            Err(SyncError::Configuration(_))
        ));
        assert_eq!(h.engine.status(&h.config.id).state, SyncState::Idle);
        assert_eq!(h.server.counts().ping, 0);
    }

    #[tokio::test]
    async fn missing_password_is_a_configuration_error() {
        let dir = tempdir().unwrap();
        let db = DatabaseService::open_in_memory().unwrap();
        let config = SyncConfig::new("https://dav.example.com", "alice", "Home").unwrap();
        db.save_sync_config(&config).await.unwrap();
        let engine = SyncEngine::new(
            db,
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemoryConnector::default()),
            EngineOptions::new(dir.path()),
        );

        assert!(matches!(
            engine.start_sync(config.id).await,
            Err(SyncError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn auth_rejection_fails_the_run_with_distinct_message() {
        let h = harness().await;
        h.server.set_reject_auth(true);

        let error = h.engine.start_sync(h.config.id).await.unwrap_err();

        assert!(error.is_auth());
        let status = h.engine.status(&h.config.id);
        assert_eq!(status.state, SyncState::Failed);
        assert_eq!(
            status.error_message.as_deref(),
            Some("The sync server rejected your username or password.")
        );
        assert_eq!(h.server.counts().ping, 1);
        assert!(!h.engine.is_running(&h.config.id));
    }

    #[tokio::test]
    async fn cancel_without_run_is_a_no_op() {
        let h = harness().await;
        assert!(!h.engine.cancel_sync(&h.config.id));
    }

    #[tokio::test]
    async fn connection_test_round_trips_and_cleans_up() {
        let h = harness().await;

        assert!(h.engine.test_connection(&h.config, "secret").await.unwrap());
        assert!(h.server.has_dir(BASE_PATH));
        assert!(h.server.file_paths().is_empty());
        assert!(h.engine.db().list_journals().await.unwrap().len() == 1);

        h.server.set_reject_auth(true);
        assert!(!h.engine.test_connection(&h.config, "wrong").await.unwrap());
    }

    #[tokio::test]
    async fn connection_test_rejects_invalid_config() {
        let h = harness().await;
        let mut config = h.config.clone();
        config.server_url = "ftp://dav.example.com".to_string();

        assert!(matches!(
            h.engine.test_connection(&config, "secret").await,
            Err(SyncError::Configuration(_))
        ));
    }
}
