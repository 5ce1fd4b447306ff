//! In-process WebDAV server model.
//!
//! Clones share the same store, so several simulated devices can talk to one
//! "server". Collections must exist before children are written, mirroring
//! real servers that answer 409 for a missing parent.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{normalize_path, parent_path, WebDavClient, WebDavError, WebDavResult};

/// Number of calls per operation since creation or the last reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationCounts {
    /// `ping` calls
    pub ping: usize,
    /// `mkdir` calls
    pub mkdir: usize,
    /// `read_dir` calls
    pub read_dir: usize,
    /// `read` calls
    pub read: usize,
    /// `write` calls
    pub write: usize,
    /// `remove` calls
    pub remove: usize,
    /// `exists` calls
    pub exists: usize,
}

#[derive(Debug)]
struct InjectedFailure {
    error: WebDavError,
    remaining: Option<usize>,
}

#[derive(Debug)]
struct State {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    counts: OperationCounts,
    written: Vec<String>,
    reject_auth: bool,
    failures: HashMap<String, InjectedFailure>,
    latency: Option<Duration>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            dirs: BTreeSet::from(["/".to_string()]),
            files: BTreeMap::new(),
            counts: OperationCounts::default(),
            written: Vec::new(),
            reject_auth: false,
            failures: HashMap::new(),
            latency: None,
        }
    }
}

impl State {
    fn check(&mut self, path: &str) -> WebDavResult<()> {
        if self.reject_auth {
            return Err(WebDavError::Unauthorized { status: 401 });
        }

        let Some(failure) = self.failures.get_mut(path) else {
            return Ok(());
        };
        let error = failure.error.clone();
        match failure.remaining.as_mut() {
            None => Err(error),
            Some(remaining) => {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    self.failures.remove(path);
                }
                Err(error)
            }
        }
    }

    fn is_dir(&self, path: &str) -> bool {
        self.dirs.contains(path)
    }

    fn parent_exists(&self, path: &str) -> bool {
        parent_path(path).is_some_and(|parent| self.is_dir(&parent))
    }

    fn children(&self, path: &str) -> Vec<String> {
        let is_child = |candidate: &&String| {
            candidate.as_str() != path && parent_path(candidate).as_deref() == Some(path)
        };
        let mut children: Vec<String> = self
            .dirs
            .iter()
            .filter(is_child)
            .chain(self.files.keys().filter(is_child))
            .cloned()
            .collect();
        children.sort();
        children
    }
}

/// Shared in-memory WebDAV store implementing [`WebDavClient`].
#[derive(Debug, Clone, Default)]
pub struct MemoryWebDav {
    state: Arc<Mutex<State>>,
}

impl MemoryWebDav {
    /// Create an empty server containing only the root collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_latency(&self) {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Make every operation fail with 401 until switched off
    pub fn set_reject_auth(&self, reject: bool) {
        self.lock().reject_auth = reject;
    }

    /// Delay every operation, to keep runs in flight during tests
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    /// Fail every operation on `path` with `error` until cleared
    pub fn fail_path(&self, path: &str, error: WebDavError) {
        self.lock().failures.insert(
            normalize_path(path),
            InjectedFailure {
                error,
                remaining: None,
            },
        );
    }

    /// Fail the next `times` operations on `path` with `error`
    pub fn fail_path_times(&self, path: &str, error: WebDavError, times: usize) {
        if times == 0 {
            return;
        }
        self.lock().failures.insert(
            normalize_path(path),
            InjectedFailure {
                error,
                remaining: Some(times),
            },
        );
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Operation counters
    #[must_use]
    pub fn counts(&self) -> OperationCounts {
        self.lock().counts
    }

    /// Paths written since creation or the last reset, in order
    #[must_use]
    pub fn written_paths(&self) -> Vec<String> {
        self.lock().written.clone()
    }

    /// Zero the counters and the write log
    pub fn reset_counts(&self) {
        let mut state = self.lock();
        state.counts = OperationCounts::default();
        state.written.clear();
    }

    /// Stored bytes of a file, bypassing auth and failure injection
    #[must_use]
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(&normalize_path(path)).cloned()
    }

    /// All stored file paths, sorted
    #[must_use]
    pub fn file_paths(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    /// Whether a collection exists, bypassing auth and failure injection
    #[must_use]
    pub fn has_dir(&self, path: &str) -> bool {
        self.lock().is_dir(&normalize_path(path))
    }

    /// Store a file directly, creating missing parent collections
    pub fn put_file(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        let path = normalize_path(path);
        let mut state = self.lock();
        let mut parent = parent_path(&path);
        while let Some(dir) = parent {
            parent = parent_path(&dir);
            state.dirs.insert(dir);
        }
        state.files.insert(path, bytes.into());
    }

    /// Delete a file directly
    pub fn delete_file(&self, path: &str) {
        self.lock().files.remove(&normalize_path(path));
    }
}

#[async_trait]
impl WebDavClient for MemoryWebDav {
    async fn ping(&self) -> WebDavResult<()> {
        self.simulate_latency().await;
        let mut state = self.lock();
        state.counts.ping += 1;
        state.check("/")
    }

    async fn mkdir(&self, path: &str) -> WebDavResult<()> {
        self.simulate_latency().await;
        let path = normalize_path(path);
        let mut state = self.lock();
        state.counts.mkdir += 1;
        state.check(&path)?;

        if state.is_dir(&path) || state.files.contains_key(&path) {
            return Err(WebDavError::AlreadyExists(path));
        }
        if !state.parent_exists(&path) {
            return Err(WebDavError::Http {
                status: 409,
                message: format!("Parent collection missing for {path}"),
            });
        }
        state.dirs.insert(path);
        Ok(())
    }

    async fn read_dir(&self, path: &str) -> WebDavResult<Vec<String>> {
        self.simulate_latency().await;
        let path = normalize_path(path);
        let mut state = self.lock();
        state.counts.read_dir += 1;
        state.check(&path)?;

        if !state.is_dir(&path) {
            return Err(WebDavError::NotFound(path));
        }
        Ok(state.children(&path))
    }

    async fn read(&self, path: &str) -> WebDavResult<Vec<u8>> {
        self.simulate_latency().await;
        let path = normalize_path(path);
        let mut state = self.lock();
        state.counts.read += 1;
        state.check(&path)?;

        state
            .files
            .get(&path)
            .cloned()
            .ok_or(WebDavError::NotFound(path))
    }

    async fn write(&self, path: &str, bytes: Vec<u8>) -> WebDavResult<()> {
        self.simulate_latency().await;
        let path = normalize_path(path);
        let mut state = self.lock();
        state.counts.write += 1;
        state.check(&path)?;

        if state.is_dir(&path) {
            return Err(WebDavError::Http {
                status: 405,
                message: format!("{path} is a collection"),
            });
        }
        if !state.parent_exists(&path) {
            return Err(WebDavError::Http {
                status: 409,
                message: format!("Parent collection missing for {path}"),
            });
        }
        state.written.push(path.clone());
        state.files.insert(path, bytes);
        Ok(())
    }

    async fn remove(&self, path: &str) -> WebDavResult<()> {
        self.simulate_latency().await;
        let path = normalize_path(path);
        let mut state = self.lock();
        state.counts.remove += 1;
        state.check(&path)?;

        if state.files.remove(&path).is_some() {
            return Ok(());
        }
        if path != "/" && state.dirs.remove(&path) {
            let prefix = format!("{path}/");
            state.dirs.retain(|dir| !dir.starts_with(&prefix));
            state.files.retain(|file, _| !file.starts_with(&prefix));
            return Ok(());
        }
        Err(WebDavError::NotFound(path))
    }

    async fn exists(&self, path: &str) -> WebDavResult<bool> {
        self.simulate_latency().await;
        let path = normalize_path(path);
        let mut state = self.lock();
        state.counts.exists += 1;
        state.check(&path)?;

        Ok(state.is_dir(&path) || state.files.contains_key(&path))
    }
}
