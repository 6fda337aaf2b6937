pub mod adapter;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod store;
pub mod worker;

pub use adapter::{AdapterError, AdapterSet, FileKind, ModelCatalog};
pub use broadcast::{EventBroadcaster, OrchestratorEvent, ProgressSnapshot, RunState};
pub use config::{load_config, ConfigError, TriageConfig};
pub use error::{DoctriageError, Result};
pub use pipeline::{Pipeline, PipelineError, PipelineOutcome, ProcessingResult};
pub use queue::{ItemStatus, QueueStatistics, WorkItem, WorkQueue};
pub use store::{ResultStore, SqliteStore, StoreError};
pub use worker::{BatchCounters, Orchestrator, StateError};
