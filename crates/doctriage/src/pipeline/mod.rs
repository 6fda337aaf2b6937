pub mod context;
pub mod error;
pub mod progress;
pub mod runner;

pub use context::{ItemContext, PipelineOutcome, ProcessingResult};
pub use error::{PipelineError, ValidationError};
pub use progress::{BroadcastPhases, NoopPhases, PhaseReporter};
pub use runner::Pipeline;
