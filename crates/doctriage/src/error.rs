use thiserror::Error;

#[derive(Error, Debug)]
pub enum DoctriageError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] crate::adapter::AdapterError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("State error: {0}")]
    State(#[from] crate::worker::StateError),
}

pub type Result<T> = std::result::Result<T, DoctriageError>;
