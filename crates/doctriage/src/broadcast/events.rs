//! Orchestrator event stream.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Orchestrator state as observed by subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Pausing,
    Paused,
    Stopping,
    Stopped,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running => write!(f, "running"),
            RunState::Pausing => write!(f, "pausing"),
            RunState::Paused => write!(f, "paused"),
            RunState::Stopping => write!(f, "stopping"),
            RunState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Phase of a single item's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemPhase {
    Fingerprinting,
    CheckingDuplicate,
    Extracting,
    Classifying,
    Persisting,
}

impl std::fmt::Display for ItemPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemPhase::Fingerprinting => write!(f, "Fingerprinting"),
            ItemPhase::CheckingDuplicate => write!(f, "Checking for duplicate"),
            ItemPhase::Extracting => write!(f, "Extracting content"),
            ItemPhase::Classifying => write!(f, "Classifying"),
            ItemPhase::Persisting => write!(f, "Persisting"),
        }
    }
}

/// Events emitted by the orchestrator. Every event carries the id of the
/// batch run it belongs to and a timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum OrchestratorEvent {
    #[serde(rename_all = "camelCase")]
    StateChanged {
        batch_id: String,
        from: RunState,
        to: RunState,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    ItemStarted {
        batch_id: String,
        file_path: PathBuf,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    ItemPhase {
        batch_id: String,
        file_path: PathBuf,
        phase: ItemPhase,
        message: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    ItemCompleted {
        batch_id: String,
        file_path: PathBuf,
        content_hash: String,
        tags: Vec<String>,
        needs_review: bool,
        timestamp: DateTime<Utc>,
    },
    /// The file's content was already analyzed; nothing was persisted.
    #[serde(rename_all = "camelCase")]
    ItemSkipped {
        batch_id: String,
        file_path: PathBuf,
        content_hash: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    ItemFailed {
        batch_id: String,
        file_path: PathBuf,
        error: String,
        /// True when the failure happened while persisting — implies
        /// potential data loss and is never silently swallowed.
        persistence: bool,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Progress {
        batch_id: String,
        current: u64,
        total: u64,
        elapsed_secs: f64,
        items_per_second: f64,
        eta_secs: Option<f64>,
        timestamp: DateTime<Utc>,
    },
    /// The queue drained naturally — distinct from a user-triggered stop.
    #[serde(rename_all = "camelCase")]
    BatchCompleted {
        batch_id: String,
        processed: u64,
        failed: u64,
        skipped: u64,
        elapsed_secs: f64,
        timestamp: DateTime<Utc>,
    },
    /// The batch was interrupted by `stop()`.
    #[serde(rename_all = "camelCase")]
    BatchStopped {
        batch_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl OrchestratorEvent {
    pub fn batch_id(&self) -> &str {
        match self {
            OrchestratorEvent::StateChanged { batch_id, .. }
            | OrchestratorEvent::ItemStarted { batch_id, .. }
            | OrchestratorEvent::ItemPhase { batch_id, .. }
            | OrchestratorEvent::ItemCompleted { batch_id, .. }
            | OrchestratorEvent::ItemSkipped { batch_id, .. }
            | OrchestratorEvent::ItemFailed { batch_id, .. }
            | OrchestratorEvent::Progress { batch_id, .. }
            | OrchestratorEvent::BatchCompleted { batch_id, .. }
            | OrchestratorEvent::BatchStopped { batch_id, .. } => batch_id,
        }
    }
}

/// Broadcasts orchestrator events to all subscribers.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: Arc<broadcast::Sender<OrchestratorEvent>>,
}

impl EventBroadcaster {
    /// Creates a broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends an event to all subscribers. No active receivers is fine.
    pub fn send(&self, event: OrchestratorEvent) {
        let _ = self.sender.send(event);
    }

    /// Creates a new subscriber for orchestrator events.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.sender.subscribe()
    }

    /// Gets the inner sender for sharing with the worker.
    pub fn sender(&self) -> Arc<broadcast::Sender<OrchestratorEvent>> {
        Arc::clone(&self.sender)
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
