use std::path::PathBuf;

use crate::adapter::{FileIdentity, FileKind};
use crate::store::{Description, ExtractedPage, ScoredTag};

/// Everything produced for one item, owned until handed to the store and
/// discarded afterwards.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub file_path: PathBuf,
    pub content_hash: String,
    pub file_kind: FileKind,
    pub page_count: u32,
    pub pages: Vec<ExtractedPage>,
    pub tags: Vec<ScoredTag>,
    pub description: Description,
    pub needs_review: bool,
}

/// Scratch state threaded through the pipeline steps.
pub struct ItemContext {
    // Input
    pub file_path: PathBuf,

    // Fingerprint step — guaranteed Some afterwards
    pub kind: Option<FileKind>,
    pub bytes: Option<Vec<u8>>,
    pub identity: Option<FileIdentity>,

    // Extraction step
    pub pages: Vec<ExtractedPage>,
    pub raw_tag_text: Option<String>,
    pub tag_confidence: f32,
    pub description: Option<Description>,
}

impl ItemContext {
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            file_path,
            kind: None,
            bytes: None,
            identity: None,
            pages: Vec::new(),
            raw_tag_text: None,
            tag_confidence: 0.0,
            description: None,
        }
    }
}

/// What the pipeline produced for an item.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// The item was analyzed and persisted.
    Persisted {
        file_id: i64,
        result: ProcessingResult,
    },
    /// The content was already analyzed; nothing was persisted.
    Skipped { content_hash: String },
}
