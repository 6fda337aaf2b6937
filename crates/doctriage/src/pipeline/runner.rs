use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::warn;
use tracing::{debug, info_span};

use crate::adapter::{
    normalize_tags, parse_tag_text, AdapterSet, FileIdentity, FileKind, GenerationKind, OcrMode,
};
use crate::broadcast::ItemPhase;
use crate::config::TriageConfig;
use crate::fingerprint::content_hash;
use crate::store::{Description, ExtractedPage, NewFileRecord, ResultStore, ScoredTag};

use super::context::{ItemContext, PipelineOutcome, ProcessingResult};
use super::error::{PipelineError, ValidationError};
use super::progress::PhaseReporter;

/// Classification prompts are capped to keep generation calls bounded on
/// very large documents.
const PROMPT_CHAR_CAP: usize = 4000;

/// Engine label for pages read directly from plain-text files.
const DIRECT_ENGINE: &str = "direct";
/// Engine label for OCR-recognized pages.
const OCR_ENGINE: &str = "ocr";
/// Engine and model label for vision-derived content.
const VISION_ENGINE: &str = "vision";

pub struct Pipeline {
    store: Arc<dyn ResultStore>,
    adapters: AdapterSet,
    tag_cap: usize,
    min_confidence: f32,
    ocr_mode: OcrMode,
    /// Call budget handed to adapter backends. Hard enforcement is the
    /// backend's duty; overruns observed here are logged.
    adapter_timeout: Duration,
}

impl Pipeline {
    pub fn new(store: Arc<dyn ResultStore>, adapters: AdapterSet, config: &TriageConfig) -> Self {
        Self {
            store,
            adapters,
            tag_cap: config.tag_cap,
            min_confidence: config.min_confidence,
            ocr_mode: config.ocr.mode,
            adapter_timeout: Duration::from_secs(config.adapter_timeout_secs),
        }
    }

    fn timed_call<T>(
        &self,
        what: &str,
        call: impl FnOnce() -> Result<T, crate::adapter::AdapterError>,
    ) -> Result<T, crate::adapter::AdapterError> {
        let started = Instant::now();
        let result = call();
        let elapsed = started.elapsed();
        if elapsed > self.adapter_timeout {
            warn!(
                "{} call ran {:.1}s, over the {}s budget",
                what,
                elapsed.as_secs_f64(),
                self.adapter_timeout.as_secs()
            );
        }
        result
    }

    /// Runs the full pipeline for a single file.
    pub fn process(
        &self,
        file_path: &Path,
        reporter: &dyn PhaseReporter,
    ) -> Result<PipelineOutcome, PipelineError> {
        let filename = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("<unknown>");
        let _pipeline_span = info_span!("pipeline", filename = %filename).entered();

        let mut ctx = ItemContext::new(file_path.to_path_buf());

        // Step 1: Fingerprint
        {
            let _step = info_span!("fingerprint").entered();
            reporter.phase(ItemPhase::Fingerprinting, "Computing content fingerprint...");
            self.step_fingerprint(&mut ctx)?;
        }

        // Step 2: Dedup check
        {
            let _step = info_span!("dedup_check").entered();
            reporter.phase(ItemPhase::CheckingDuplicate, "Checking for prior analysis...");
            let identity = ctx.identity.as_ref().expect("step 1 completed");
            if let Some(record) = self.store.find_by_hash(&identity.content_hash)? {
                debug!(
                    "Content of {} already analyzed as file id {}",
                    filename, record.id
                );
                return Ok(PipelineOutcome::Skipped {
                    content_hash: identity.content_hash.clone(),
                });
            }
        }

        // Step 3: Extraction
        {
            let _step = info_span!("extract").entered();
            reporter.phase(ItemPhase::Extracting, "Extracting content...");
            self.step_extract(&mut ctx)?;
        }

        // Step 4: Classification + tag normalization
        let tags = {
            let _step = info_span!("classify").entered();
            reporter.phase(ItemPhase::Classifying, "Generating tags and description...");
            self.step_classify(&mut ctx)?
        };

        // Step 5: Assemble
        let result = self.assemble(ctx, tags);

        // Step 6: Persist
        let _step = info_span!("persist").entered();
        reporter.phase(ItemPhase::Persisting, "Persisting results...");
        let file_id = self.step_persist(&result)?;

        Ok(PipelineOutcome::Persisted { file_id, result })
    }

    fn step_fingerprint(&self, ctx: &mut ItemContext) -> Result<(), PipelineError> {
        let kind = FileKind::from_path(&ctx.file_path).ok_or_else(|| {
            let ext = ctx
                .file_path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_string();
            ValidationError::UnsupportedKind(ext)
        })?;

        let bytes = std::fs::read(&ctx.file_path).map_err(|e| ValidationError::Unreadable {
            path: ctx.file_path.clone(),
            source: e,
        })?;

        let hash = content_hash(&bytes);
        ctx.identity = Some(FileIdentity {
            path: ctx.file_path.clone(),
            content_hash: hash,
        });
        ctx.kind = Some(kind);
        ctx.bytes = Some(bytes);
        Ok(())
    }

    fn step_extract(&self, ctx: &mut ItemContext) -> Result<(), PipelineError> {
        let kind = ctx.kind.expect("step 1 completed");
        match kind {
            FileKind::Image => {
                let bytes = ctx.bytes.as_ref().expect("step 1 completed");
                // The identity handed over is always the current item's —
                // never a cached prior file's.
                let identity = ctx.identity.as_ref().expect("step 1 completed");
                let analysis =
                    self.timed_call("vision", || self.adapters.vision.analyze(bytes, identity))?;

                ctx.pages = vec![ExtractedPage {
                    page_no: 1,
                    text: analysis.description.clone(),
                    confidence: analysis.confidence,
                    engine: VISION_ENGINE.to_string(),
                }];
                ctx.raw_tag_text = Some(analysis.tags);
                ctx.tag_confidence = analysis.confidence;
                ctx.description = Some(Description {
                    text: analysis.description,
                    confidence: analysis.confidence,
                    model: VISION_ENGINE.to_string(),
                });
            }
            FileKind::Pdf => {
                let pages = self.timed_call("ocr", || {
                    self.adapters.ocr.recognize(&ctx.file_path, self.ocr_mode)
                })?;
                ctx.pages = pages
                    .into_iter()
                    .map(|p| ExtractedPage {
                        page_no: p.page_no,
                        text: p.text,
                        confidence: p.confidence,
                        engine: OCR_ENGINE.to_string(),
                    })
                    .collect();
            }
            FileKind::Text => {
                let bytes = ctx.bytes.as_ref().expect("step 1 completed");
                let text = String::from_utf8_lossy(bytes).into_owned();
                ctx.pages = vec![ExtractedPage {
                    page_no: 1,
                    text,
                    confidence: 1.0,
                    engine: DIRECT_ENGINE.to_string(),
                }];
            }
        }
        Ok(())
    }

    /// Produces the normalized tag list, invoking text generation for
    /// document/text items (images already carry vision output).
    fn step_classify(&self, ctx: &mut ItemContext) -> Result<Vec<ScoredTag>, PipelineError> {
        if ctx.raw_tag_text.is_none() {
            let mut prompt = ctx
                .pages
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            if prompt.len() > PROMPT_CHAR_CAP {
                let mut cut = PROMPT_CHAR_CAP;
                while !prompt.is_char_boundary(cut) {
                    cut -= 1;
                }
                prompt.truncate(cut);
            }

            let tags = self.timed_call("text generation", || {
                self.adapters.text_gen.generate(&prompt, GenerationKind::Tags)
            })?;
            let description = self.timed_call("text generation", || {
                self.adapters
                    .text_gen
                    .generate(&prompt, GenerationKind::Description)
            })?;

            ctx.raw_tag_text = Some(tags.text);
            ctx.tag_confidence = tags.confidence;
            ctx.description = Some(Description {
                text: description.text,
                confidence: description.confidence,
                model: description.model_name,
            });
        }

        let raw = ctx.raw_tag_text.as_deref().unwrap_or("");
        let labels = normalize_tags(parse_tag_text(raw), self.tag_cap);
        let confidence = ctx.tag_confidence;
        Ok(labels
            .into_iter()
            .map(|label| ScoredTag { label, confidence })
            .collect())
    }

    fn assemble(&self, ctx: ItemContext, tags: Vec<ScoredTag>) -> ProcessingResult {
        let identity = ctx.identity.expect("step 1 completed");
        let kind = ctx.kind.expect("step 1 completed");
        let description = ctx.description.expect("step 4 completed");

        let text_empty = ctx.pages.iter().all(|p| p.text.trim().is_empty());
        let lowest_confidence = ctx
            .pages
            .iter()
            .map(|p| p.confidence)
            .chain([ctx.tag_confidence, description.confidence])
            .fold(f32::INFINITY, f32::min);
        let needs_review = text_empty || lowest_confidence < self.min_confidence;

        ProcessingResult {
            file_path: identity.path,
            content_hash: identity.content_hash,
            file_kind: kind,
            page_count: ctx.pages.len() as u32,
            pages: ctx.pages,
            tags,
            description,
            needs_review,
        }
    }

    fn step_persist(&self, result: &ProcessingResult) -> Result<i64, PipelineError> {
        let record = NewFileRecord {
            content_hash: result.content_hash.clone(),
            file_path: result.file_path.clone(),
            file_kind: result.file_kind,
            page_count: result.page_count,
            needs_review: result.needs_review,
        };
        let file_id = self
            .store
            .save(&record, &result.pages, &result.tags, &result.description)?;
        debug!(
            "Persisted {} as file id {} ({} tags)",
            result.file_path.display(),
            file_id,
            result.tags.len()
        );
        Ok(file_id)
    }
}
