//! Secondary (zero-shot) classifier adapter

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, PipelineResult, ServiceError};
use crate::types::{ClassificationResult, Label, ServiceKind};

/// Zero-shot response: labels ordered by score, descending, with matching scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZeroShotResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,
    pub labels: Vec<String>,
    pub scores: Vec<f64>,
}

impl ZeroShotResponse {
    pub fn new(labels: Vec<String>, scores: Vec<f64>) -> Self {
        Self {
            sequence: None,
            labels,
            scores,
        }
    }

    /// Validate and extract the top entry.
    pub fn top(&self) -> Result<ClassificationResult, String> {
        if self.labels.len() != self.scores.len() {
            return Err(format!(
                "{} labels but {} scores",
                self.labels.len(),
                self.scores.len()
            ));
        }
        let (raw_label, score) = self
            .labels
            .first()
            .zip(self.scores.first())
            .ok_or_else(|| "empty label list".to_string())?;
        let label: Label = raw_label
            .parse()
            .map_err(|_| format!("label {:?} is outside the candidate set", raw_label))?;
        ClassificationResult::new(label, *score)
            .ok_or_else(|| format!("score {} for {} is not in [0, 1]", score, label))
    }
}

/// The secondary classification service
#[async_trait]
pub trait SecondaryService: Send + Sync {
    /// Rank `candidate_labels` for `text`.
    async fn predict(
        &self,
        text: &str,
        candidate_labels: &[&str],
    ) -> Result<ZeroShotResponse, ServiceError>;
}

/// Adapter around a [`SecondaryService`]
#[derive(Clone)]
pub struct SecondaryClassifier {
    service: Arc<dyn SecondaryService>,
}

impl SecondaryClassifier {
    pub fn new(service: Arc<dyn SecondaryService>) -> Self {
        Self { service }
    }

    /// Classify `text` against the fixed candidate set; uses only the top entry.
    pub async fn classify(&self, text: &str) -> PipelineResult<ClassificationResult> {
        let candidates = Label::candidate_names();
        let response = self
            .service
            .predict(text, &candidates)
            .await
            .map_err(|e| e.into_pipeline(ServiceKind::Secondary))?;
        debug!(labels = ?response.labels, scores = ?response.scores, "Secondary raw ranking");

        response
            .top()
            .map_err(|msg| PipelineError::malformed(ServiceKind::Secondary, msg))
    }
}
