use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::adapter::OcrMode;

/// Core processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageConfig {
    /// Maximum number of tags persisted per file.
    #[serde(default = "default_tag_cap")]
    pub tag_cap: usize,
    /// Results with adapter confidence below this are flagged for review.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// Bounded timeout handed to adapter backends, in seconds.
    #[serde(default = "default_adapter_timeout_secs")]
    pub adapter_timeout_secs: u64,
    #[serde(default)]
    pub ocr: OcrSettings,
    /// Result store location; `None` means the canonical per-user path.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

fn default_tag_cap() -> usize {
    6
}

fn default_min_confidence() -> f32 {
    0.5
}

fn default_adapter_timeout_secs() -> u64 {
    120
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            tag_cap: default_tag_cap(),
            min_confidence: default_min_confidence(),
            adapter_timeout_secs: default_adapter_timeout_secs(),
            ocr: OcrSettings::default(),
            database_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrSettings {
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default)]
    pub mode: OcrMode,
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            mode: OcrMode::default(),
        }
    }
}
