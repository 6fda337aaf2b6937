//! Event broadcasting for UI-facing subscribers.
//!
//! The worker never mutates caller-visible state directly: it emits
//! immutable event messages over an ordered broadcast channel, and only the
//! subscribing context applies them. Events from one batch run are always
//! observed in emission order.

pub mod events;
pub mod progress;

pub use events::{EventBroadcaster, ItemPhase, OrchestratorEvent, RunState};
pub use progress::{ProgressClock, ProgressSnapshot, ProgressTracker};
