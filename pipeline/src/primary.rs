//! Primary Classifier Adapter
//!
//! Wraps the main text-classification service and turns its raw per-label
//! scores into a single [`ClassificationResult`]:
//!
//! 1. Truncate the input to `max_input_units` whitespace-separated units
//! 2. Call the service (the same limit is passed along as `max_length`)
//! 3. Map raw label ids (`LABEL_0`, `LABEL_1`, ...) onto [`Label`]
//! 4. Pick the top score; ties go to the label that sorts first

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, PipelineResult, ServiceError};
use crate::events::{SharedEventSink, StageEvent, StageRecord};
use crate::state::{ClassifiedRequest, PendingRequest};
use crate::types::{ClassificationResult, Label, ServiceKind};

/// One raw `{label, score}` entry as returned by the primary service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScore {
    pub label: String,
    pub score: f64,
}

impl RawScore {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// The primary classification service
#[async_trait]
pub trait PrimaryService: Send + Sync {
    /// Score every label for `text`, truncating beyond `max_length` units.
    async fn predict(&self, text: &str, max_length: usize) -> Result<Vec<RawScore>, ServiceError>;
}

/// Map a raw label identifier onto the label domain.
///
/// Accepts `LABEL_<n>`, a bare index `<n>`, or a canonical label name in
/// any case. Anything else is unknown.
pub fn map_label(raw: &str) -> Option<Label> {
    let raw = raw.trim();
    if let Ok(label) = raw.parse::<Label>() {
        return Some(label);
    }
    let index = raw.strip_prefix("LABEL_").unwrap_or(raw);
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Label::from_index(index.parse().ok()?)
}

/// Keep at most `max_units` whitespace-separated units.
///
/// Returns the kept prefix of the original text (ending at the last kept
/// unit) and whether anything was dropped.
pub fn truncate_units(text: &str, max_units: usize) -> (&str, bool) {
    let mut units = 0usize;
    let mut in_unit = false;
    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            in_unit = false;
        } else if !in_unit {
            in_unit = true;
            units += 1;
            if units > max_units {
                return (text[..idx].trim_end(), true);
            }
        }
    }
    (text, false)
}

/// Pick the single highest-scoring label.
///
/// Every entry must map to a known label with a score in `[0, 1]`; equal top
/// scores resolve to the label that sorts first.
pub fn select_top(scores: &[RawScore]) -> Result<ClassificationResult, String> {
    let mut best: Option<ClassificationResult> = None;
    for raw in scores {
        let label = map_label(&raw.label).ok_or_else(|| format!("unknown label {:?}", raw.label))?;
        let candidate = ClassificationResult::new(label, raw.score)
            .ok_or_else(|| format!("score {} for {} is not in [0, 1]", raw.score, label))?;
        best = match best {
            Some(current)
                if current.confidence > candidate.confidence
                    || (current.confidence == candidate.confidence
                        && current.label <= candidate.label) =>
            {
                Some(current)
            }
            _ => Some(candidate),
        };
    }
    best.ok_or_else(|| "empty score list".to_string())
}

/// Adapter around a [`PrimaryService`]
#[derive(Clone)]
pub struct PrimaryClassifier {
    service: Arc<dyn PrimaryService>,
    max_input_units: usize,
}

impl PrimaryClassifier {
    pub fn new(service: Arc<dyn PrimaryService>, max_input_units: usize) -> Self {
        Self {
            service,
            max_input_units,
        }
    }

    /// Classify `text` into a single label and confidence.
    ///
    /// Emits no stage record; [`run`](Self::run) is the recorded stage.
    pub async fn classify(&self, text: &str) -> PipelineResult<ClassificationResult> {
        self.classify_truncated(text).await.map(|(result, _)| result)
    }

    async fn classify_truncated(&self, text: &str) -> PipelineResult<(ClassificationResult, bool)> {
        let (kept, truncated) = truncate_units(text, self.max_input_units);
        if truncated {
            debug!(
                max_units = self.max_input_units,
                kept_bytes = kept.len(),
                total_bytes = text.len(),
                "Truncated primary input"
            );
        }

        let scores = self
            .service
            .predict(kept, self.max_input_units)
            .await
            .map_err(|e| e.into_pipeline(ServiceKind::Primary))?;
        debug!(?scores, "Primary raw scores");

        let result =
            select_top(&scores).map_err(|msg| PipelineError::malformed(ServiceKind::Primary, msg))?;
        Ok((result, truncated))
    }

    /// Stage 1: classify the request input and record the prediction.
    pub async fn run(
        &self,
        request: PendingRequest,
        sink: &SharedEventSink,
    ) -> PipelineResult<ClassifiedRequest> {
        let (result, truncated) = self.classify_truncated(request.input().as_str()).await?;

        sink.record(StageRecord::new(
            request.id(),
            StageEvent::PrimaryClassified {
                input: request.input().to_string(),
                label: result.label,
                confidence: result.confidence,
                truncated,
            },
        ));

        Ok(request.classified(result))
    }
}
