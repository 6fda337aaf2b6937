use std::path::PathBuf;

use thiserror::Error;

/// The file itself is unusable — unreadable or of an unsupported kind.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Failed to read file '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported file type: '{0}'")]
    UnsupportedKind(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Extraction failed: {0}")]
    Adapter(#[from] crate::adapter::AdapterError),

    /// Distinct from the other variants: implies potential data loss and
    /// must be surfaced to the caller, never just logged.
    #[error("Persistence failed: {0}")]
    Persistence(#[from] crate::store::StoreError),
}

impl PipelineError {
    pub fn is_persistence(&self) -> bool {
        matches!(self, PipelineError::Persistence(_))
    }
}
