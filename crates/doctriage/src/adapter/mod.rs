//! Extraction adapter seams.
//!
//! OCR, vision, and text-generation backends are external collaborators;
//! the core consumes them through these traits. Implementations are
//! expected to enforce the bounded call timeout they are constructed with
//! and to report overruns as [`AdapterError::Timeout`].

pub mod models;
pub mod stub;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use models::{ModelCatalog, ModelVariant};
pub use stub::{KeywordTagger, KeywordVision};

/// Errors from adapter calls.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("Vision analysis failed: {0}")]
    Vision(String),

    #[error("Text generation failed: {0}")]
    Generation(String),

    #[error("Adapter call exceeded {seconds}s timeout")]
    Timeout { seconds: u64 },

    #[error("No backend available for {0}")]
    NoBackend(String),
}

/// Kind of file being processed, detected from the path's MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Image,
    Pdf,
    Text,
}

impl FileKind {
    /// Detects the kind from the path extension via MIME lookup.
    /// Returns `None` for unsupported or unknown extensions.
    pub fn from_path(path: &Path) -> Option<Self> {
        let mime = mime_guess::from_path(path).first()?;
        match (mime.type_().as_str(), mime.subtype().as_str()) {
            ("image", _) => Some(Self::Image),
            ("application", "pdf") => Some(Self::Pdf),
            ("text", _) => Some(Self::Text),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the file a request is about. Always built from the item
/// currently in flight — a vision backend must never be handed a cached
/// prior file's identity, or descriptions leak across items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    pub path: PathBuf,
    pub content_hash: String,
}

/// OCR recognition mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrMode {
    Fast,
    #[default]
    Accurate,
}

/// One recognized page of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrPage {
    pub page_no: u32,
    pub text: String,
    pub confidence: f32,
}

/// Output of a vision backend for a single image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionAnalysis {
    /// Raw tag text as produced by the backend (comma or newline separated).
    pub tags: String,
    pub description: String,
    pub confidence: f32,
}

/// What a text-generation call is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    Tags,
    Description,
}

/// Output of a text-generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub confidence: f32,
    pub model_name: String,
}

pub trait OcrEngine: Send + Sync {
    fn recognize(&self, path: &Path, mode: OcrMode) -> Result<Vec<OcrPage>, AdapterError>;
}

pub trait VisionEngine: Send + Sync {
    fn analyze(&self, bytes: &[u8], identity: &FileIdentity)
        -> Result<VisionAnalysis, AdapterError>;
}

pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str, kind: GenerationKind) -> Result<Generation, AdapterError>;
}

/// The set of backends the pipeline dispatches to.
#[derive(Clone)]
pub struct AdapterSet {
    pub ocr: Arc<dyn OcrEngine>,
    pub vision: Arc<dyn VisionEngine>,
    pub text_gen: Arc<dyn TextGenerator>,
}

impl AdapterSet {
    pub fn new(
        ocr: Arc<dyn OcrEngine>,
        vision: Arc<dyn VisionEngine>,
        text_gen: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            ocr,
            vision,
            text_gen,
        }
    }

    /// Keyword-based fallback set, usable without any AI backend.
    /// OCR has no keyword equivalent, so PDF items will fail until a real
    /// engine is plugged in.
    pub fn keyword_fallback() -> Self {
        Self {
            ocr: Arc::new(stub::NoOcr),
            vision: Arc::new(KeywordVision::new()),
            text_gen: Arc::new(KeywordTagger::new()),
        }
    }
}

/// Splits raw backend tag text on commas and newlines, trimming whitespace
/// and dropping empty fragments.
pub fn parse_tag_text(raw: &str) -> Vec<String> {
    raw.split(|c| c == ',' || c == '\n')
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Caps tags to `cap` entries, deduplicating case-insensitively while
/// preserving first-occurrence order (and the first occurrence's casing).
pub fn normalize_tags(tags: Vec<String>, cap: usize) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for tag in tags {
        let folded = tag.to_lowercase();
        if seen.contains(&folded) {
            continue;
        }
        seen.push(folded);
        out.push(tag);
        if out.len() == cap {
            break;
        }
    }
    out
}
