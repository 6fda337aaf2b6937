use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::broadcast::{ItemPhase, OrchestratorEvent};

/// Receives per-item phase updates from the pipeline.
pub trait PhaseReporter: Send + Sync {
    fn phase(&self, phase: ItemPhase, message: &str);
}

/// No-op reporter for unit tests.
pub struct NoopPhases;

impl PhaseReporter for NoopPhases {
    fn phase(&self, _phase: ItemPhase, _message: &str) {}
}

/// Bridges pipeline phases onto the orchestrator event channel.
pub struct BroadcastPhases {
    batch_id: String,
    file_path: std::path::PathBuf,
    sender: Arc<broadcast::Sender<OrchestratorEvent>>,
}

impl BroadcastPhases {
    pub fn new(
        batch_id: &str,
        file_path: &Path,
        sender: Arc<broadcast::Sender<OrchestratorEvent>>,
    ) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            file_path: file_path.to_path_buf(),
            sender,
        }
    }
}

impl PhaseReporter for BroadcastPhases {
    fn phase(&self, phase: ItemPhase, message: &str) {
        let _ = self.sender.send(OrchestratorEvent::ItemPhase {
            batch_id: self.batch_id.clone(),
            file_path: self.file_path.clone(),
            phase,
            message: message.to_string(),
            timestamp: Utc::now(),
        });
    }
}
