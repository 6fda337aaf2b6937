pub mod orchestrator;

pub use orchestrator::{BatchCounters, Orchestrator, StateError};
