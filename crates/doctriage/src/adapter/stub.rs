//! Keyword-based fallback backends.
//!
//! These provide basic pattern matching for common document types without
//! requiring any AI backend, so the pipeline can run end-to-end out of the
//! box. Tags come from a fixed keyword table; descriptions are derived from
//! the matched categories and the leading text.

use std::path::Path;

use super::{
    AdapterError, FileIdentity, Generation, GenerationKind, OcrEngine, OcrMode, OcrPage,
    TextGenerator, VisionAnalysis, VisionEngine,
};

/// Model name reported by the keyword backends.
const KEYWORD_MODEL: &str = "keyword-match-v1";

/// Common document patterns for keyword matching.
struct DocumentPattern {
    tag: &'static str,
    keywords: &'static [&'static str],
}

/// Known document patterns. Keyword lists intentionally mix languages —
/// scanned household paperwork rarely arrives in just one.
const PATTERNS: &[DocumentPattern] = &[
    DocumentPattern {
        tag: "invoice",
        keywords: &[
            "invoice",
            "rechnung",
            "facture",
            "bill",
            "amount due",
            "total due",
            "payment due",
        ],
    },
    DocumentPattern {
        tag: "receipt",
        keywords: &[
            "receipt",
            "quittung",
            "reçu",
            "transaction",
            "purchase",
            "paid",
        ],
    },
    DocumentPattern {
        tag: "bank-statement",
        keywords: &[
            "bank statement",
            "kontoauszug",
            "account summary",
            "balance",
            "deposits",
            "withdrawals",
        ],
    },
    DocumentPattern {
        tag: "contract",
        keywords: &[
            "contract",
            "vertrag",
            "agreement",
            "terms and conditions",
            "hereby agrees",
        ],
    },
    DocumentPattern {
        tag: "insurance",
        keywords: &[
            "insurance",
            "versicherung",
            "policy",
            "coverage",
            "premium",
            "deductible",
        ],
    },
    DocumentPattern {
        tag: "tax",
        keywords: &["tax", "steuer", "irs", "w-2", "1099", "steuererklärung"],
    },
    DocumentPattern {
        tag: "medical",
        keywords: &[
            "medical",
            "doctor",
            "hospital",
            "diagnosis",
            "prescription",
            "patient",
        ],
    },
    DocumentPattern {
        tag: "utility",
        keywords: &["utility", "electric", "gas", "water", "internet", "electricity"],
    },
];

/// Matches the pattern table against lowercased text. Returns matched tags
/// in table order with a per-tag confidence derived from keyword hit ratio.
fn match_patterns(text: &str) -> Vec<(&'static str, f32)> {
    let lowered = text.to_lowercase();
    let mut matched = Vec::new();
    for pattern in PATTERNS {
        let hits = pattern
            .keywords
            .iter()
            .filter(|k| lowered.contains(&k.to_lowercase()))
            .count();
        if hits > 0 {
            let confidence = (hits as f32 / pattern.keywords.len() as f32).min(0.9);
            matched.push((pattern.tag, confidence));
        }
    }
    matched
}

fn first_line(text: &str) -> &str {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
}

/// Keyword-table text generator. Produces tags as a comma-separated list
/// and descriptions summarizing what matched.
pub struct KeywordTagger;

impl KeywordTagger {
    pub fn new() -> Self {
        Self
    }
}

impl Default for KeywordTagger {
    fn default() -> Self {
        Self::new()
    }
}

impl TextGenerator for KeywordTagger {
    fn generate(&self, prompt: &str, kind: GenerationKind) -> Result<Generation, AdapterError> {
        let matched = match_patterns(prompt);
        match kind {
            GenerationKind::Tags => {
                let text = matched
                    .iter()
                    .map(|(tag, _)| *tag)
                    .collect::<Vec<_>>()
                    .join(", ");
                // Average of per-tag confidences; zero matches mean an
                // unclassifiable document, not a failure.
                let confidence = if matched.is_empty() {
                    0.0
                } else {
                    matched.iter().map(|(_, c)| c).sum::<f32>() / matched.len() as f32
                };
                Ok(Generation {
                    text,
                    confidence,
                    model_name: KEYWORD_MODEL.to_string(),
                })
            }
            GenerationKind::Description => {
                let lead = first_line(prompt);
                let text = if matched.is_empty() {
                    format!("Unclassified document starting with \"{}\"", lead)
                } else {
                    let tags: Vec<&str> = matched.iter().map(|(tag, _)| *tag).collect();
                    format!("Document matching {} content: \"{}\"", tags.join("/"), lead)
                };
                let confidence = matched
                    .iter()
                    .map(|(_, c)| *c)
                    .fold(0.0_f32, f32::max)
                    .max(0.1);
                Ok(Generation {
                    text,
                    confidence,
                    model_name: KEYWORD_MODEL.to_string(),
                })
            }
        }
    }
}

/// Keyword vision fallback. Cannot see pixels, so it matches the pattern
/// table against the file name of the identity it was handed.
pub struct KeywordVision;

impl KeywordVision {
    pub fn new() -> Self {
        Self
    }
}

impl Default for KeywordVision {
    fn default() -> Self {
        Self::new()
    }
}

impl VisionEngine for KeywordVision {
    fn analyze(
        &self,
        _bytes: &[u8],
        identity: &FileIdentity,
    ) -> Result<VisionAnalysis, AdapterError> {
        let filename = identity
            .path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("");
        // Treat separators as spaces so "2024_invoice-scan" matches.
        let text = filename.replace(['_', '-', '.'], " ");
        let matched = match_patterns(&text);

        let tags = matched
            .iter()
            .map(|(tag, _)| *tag)
            .collect::<Vec<_>>()
            .join(", ");
        let description = if matched.is_empty() {
            format!("Image \"{}\"", filename)
        } else {
            format!("Image \"{}\" resembling {}", filename, tags)
        };
        let confidence = matched.iter().map(|(_, c)| *c).fold(0.0_f32, f32::max);

        Ok(VisionAnalysis {
            tags,
            description,
            confidence,
        })
    }
}

/// Placeholder OCR engine for builds without a recognition backend.
pub struct NoOcr;

impl OcrEngine for NoOcr {
    fn recognize(&self, _path: &Path, _mode: OcrMode) -> Result<Vec<OcrPage>, AdapterError> {
        Err(AdapterError::NoBackend("ocr".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn identity(path: &str) -> FileIdentity {
        FileIdentity {
            path: PathBuf::from(path),
            content_hash: "deadbeef".to_string(),
        }
    }

    #[test]
    fn test_tagger_matches_invoice_keywords() {
        let tagger = KeywordTagger::new();
        let gen = tagger
            .generate("Invoice #42\nAmount due: $100", GenerationKind::Tags)
            .unwrap();
        assert!(gen.text.contains("invoice"));
        assert!(gen.confidence > 0.0);
        assert_eq!(gen.model_name, KEYWORD_MODEL);
    }

    #[test]
    fn test_tagger_multiple_categories() {
        let tagger = KeywordTagger::new();
        let gen = tagger
            .generate(
                "insurance policy premium for medical treatment by a doctor",
                GenerationKind::Tags,
            )
            .unwrap();
        assert!(gen.text.contains("insurance"));
        assert!(gen.text.contains("medical"));
    }

    #[test]
    fn test_tagger_no_match_yields_empty_tags() {
        let tagger = KeywordTagger::new();
        let gen = tagger
            .generate("completely unrelated prose", GenerationKind::Tags)
            .unwrap();
        assert!(gen.text.is_empty());
        assert_eq!(gen.confidence, 0.0);
    }

    #[test]
    fn test_description_includes_leading_text() {
        let tagger = KeywordTagger::new();
        let gen = tagger
            .generate("Rechnung Nr. 7\nBetrag: 50 EUR", GenerationKind::Description)
            .unwrap();
        assert!(gen.text.contains("Rechnung Nr. 7"));
        assert!(gen.text.contains("invoice"));
    }

    #[test]
    fn test_vision_matches_filename() {
        let vision = KeywordVision::new();
        let analysis = vision
            .analyze(b"png bytes", &identity("/scans/2024_invoice-scan.png"))
            .unwrap();
        assert!(analysis.tags.contains("invoice"));
        assert!(analysis.description.contains("2024_invoice-scan"));
        assert!(analysis.confidence > 0.0);
    }

    #[test]
    fn test_vision_unmatched_filename() {
        let vision = KeywordVision::new();
        let analysis = vision
            .analyze(b"png bytes", &identity("/scans/IMG_0001.png"))
            .unwrap();
        assert!(analysis.tags.is_empty());
        assert_eq!(analysis.confidence, 0.0);
    }

    #[test]
    fn test_no_ocr_reports_missing_backend() {
        let result = NoOcr.recognize(Path::new("/scans/doc.pdf"), OcrMode::Accurate);
        assert!(matches!(result, Err(AdapterError::NoBackend(_))));
    }
}
