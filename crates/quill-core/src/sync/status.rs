//! Sync run state machine and status reporting.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::models::SyncConfigId;

use super::error::{SyncError, SyncResult};

/// Phase of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// No run has happened yet
    #[default]
    Idle,
    /// Loading manifests and reconciling
    Checking,
    /// Writing local changes to the server
    Uploading,
    /// Applying server changes locally
    Downloading,
    /// Checking the outcome of transfers
    Syncing,
    /// Propagating conflict winners
    Resolving,
    /// Manifests persisted
    Completed,
    /// Ended by an unrecoverable error
    Failed,
    /// Ended by a cancellation request
    Cancelled,
}

impl SyncState {
    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::Uploading => "uploading",
            Self::Downloading => "downloading",
            Self::Syncing => "syncing",
            Self::Resolving => "resolving",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether a run is in flight in this state
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(
            self,
            Self::Idle | Self::Completed | Self::Failed | Self::Cancelled
        )
    }

    /// Whether this state ends a run
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the state machine allows moving from `self` to `next`
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use SyncState::{
            Cancelled, Checking, Completed, Downloading, Failed, Idle, Resolving, Syncing,
            Uploading,
        };

        match (self, next) {
            (Idle | Completed | Failed | Cancelled, Checking)
            | (Checking, Uploading | Downloading | Syncing)
            | (Uploading, Downloading | Syncing)
            | (Downloading, Uploading | Syncing)
            | (Syncing, Resolving | Completed)
            | (Resolving, Completed) => true,
            (current, Failed | Cancelled) => current.is_active(),
            _ => false,
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress snapshot of the current or most recent run for a config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Config the run belongs to
    pub config_id: SyncConfigId,
    /// Current phase
    pub state: SyncState,
    /// Items scheduled in this run
    pub total_items: usize,
    /// Items processed so far
    pub completed_items: usize,
    /// Display string of the item being processed
    pub current_item: Option<String>,
    /// Error shown to the user after a failure
    pub error_message: Option<String>,
    /// True for every state except idle and the terminal ones
    pub is_active: bool,
}

impl SyncStatus {
    /// Status of a config that has never run
    #[must_use]
    pub const fn idle(config_id: SyncConfigId) -> Self {
        Self {
            config_id,
            state: SyncState::Idle,
            total_items: 0,
            completed_items: 0,
            current_item: None,
            error_message: None,
            is_active: false,
        }
    }
}

/// Owns the status channel of one config and enforces legal transitions
#[derive(Debug, Clone)]
pub struct StatusReporter {
    sender: watch::Sender<SyncStatus>,
}

impl StatusReporter {
    /// Wrap an existing channel
    #[must_use]
    pub const fn new(sender: watch::Sender<SyncStatus>) -> Self {
        Self { sender }
    }

    /// Current snapshot
    #[must_use]
    pub fn snapshot(&self) -> SyncStatus {
        self.sender.borrow().clone()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.sender.borrow().state
    }

    /// Move to `next`, rejecting transitions the state machine forbids
    pub fn transition(&self, next: SyncState) -> SyncResult<()> {
        let mut rejected = None;
        self.sender.send_if_modified(|status| {
            if !status.state.can_transition_to(next) {
                rejected = Some(status.state);
                return false;
            }
            if next == SyncState::Checking {
                status.total_items = 0;
                status.completed_items = 0;
                status.error_message = None;
            }
            status.state = next;
            status.is_active = next.is_active();
            status.current_item = None;
            true
        });

        if let Some(from) = rejected {
            return Err(SyncError::InvalidTransition { from, to: next });
        }

        let config_id = self.sender.borrow().config_id;
        tracing::debug!(%config_id, state = %next, "Sync state changed");
        Ok(())
    }

    /// Move to `Failed` with a user-facing message
    pub fn fail(&self, message: impl Into<String>) -> SyncResult<()> {
        self.transition(SyncState::Failed)?;
        let message = message.into();
        self.sender.send_modify(|status| status.error_message = Some(message));
        Ok(())
    }

    /// Add to the number of items scheduled in this run
    pub fn add_total(&self, items: usize) {
        self.sender
            .send_modify(|status| status.total_items += items);
    }

    /// Announce the item being processed
    pub fn begin_item(&self, label: impl Into<String>) {
        let label = label.into();
        self.sender
            .send_modify(|status| status.current_item = Some(label));
    }

    /// Count one processed item
    pub fn finish_item(&self) {
        self.sender.send_modify(|status| {
            status.completed_items += 1;
            status.current_item = None;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reporter() -> (StatusReporter, watch::Receiver<SyncStatus>) {
        let (sender, receiver) = watch::channel(SyncStatus::idle(SyncConfigId::new()));
        (StatusReporter::new(sender), receiver)
    }

    #[test]
    fn happy_path_transitions() {
        let (reporter, receiver) = reporter();
        for state in [
            SyncState::Checking,
            SyncState::Uploading,
            SyncState::Downloading,
            SyncState::Uploading,
            SyncState::Syncing,
            SyncState::Resolving,
            SyncState::Completed,
        ] {
            reporter.transition(state).unwrap();
            assert_eq!(receiver.borrow().state, state);
            assert_eq!(receiver.borrow().is_active, state.is_active());
        }
        reporter.transition(SyncState::Checking).unwrap();
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let (reporter, _receiver) = reporter();
        assert!(matches!(
            reporter.transition(SyncState::Completed),
            Err(SyncError::InvalidTransition {
                from: SyncState::Idle,
                to: SyncState::Completed
            })
        ));
        assert!(reporter.transition(SyncState::Failed).is_err());

        reporter.transition(SyncState::Checking).unwrap();
        assert!(reporter.transition(SyncState::Resolving).is_err());
        reporter.transition(SyncState::Cancelled).unwrap();
        assert!(reporter.transition(SyncState::Failed).is_err());
    }

    #[test]
    fn failed_and_cancelled_reachable_from_every_active_state() {
        for state in [
            SyncState::Checking,
            SyncState::Uploading,
            SyncState::Downloading,
            SyncState::Syncing,
            SyncState::Resolving,
        ] {
            assert!(state.can_transition_to(SyncState::Failed));
            assert!(state.can_transition_to(SyncState::Cancelled));
        }
        assert!(!SyncState::Completed.can_transition_to(SyncState::Cancelled));
    }

    #[test]
    fn progress_counters_reset_on_new_run() {
        let (reporter, receiver) = reporter();
        reporter.transition(SyncState::Checking).unwrap();
        reporter.add_total(2);
        reporter.begin_item("Entry Day one");
        assert_eq!(receiver.borrow().current_item.as_deref(), Some("Entry Day one"));
        reporter.finish_item();
        reporter.fail("boom").unwrap();

        let failed = reporter.snapshot();
        assert_eq!(failed.completed_items, 1);
        assert_eq!(failed.error_message.as_deref(), Some("boom"));
        assert!(!failed.is_active);

        reporter.transition(SyncState::Checking).unwrap();
        let restarted = reporter.snapshot();
        assert_eq!(restarted.total_items, 0);
        assert_eq!(restarted.error_message, None);
    }
}
