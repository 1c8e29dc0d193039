//! Caller-facing decision report

use serde::{Deserialize, Serialize};

use crate::state::{RequestState, Resolution};
use crate::types::{Label, RequestId};

/// What a caller sees for a completed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionReport {
    pub request_id: RequestId,
    pub final_label: Label,
    pub primary_confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_label: Option<Label>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_confidence: Option<f64>,
    pub resolution: Resolution,
}

impl From<&RequestState> for DecisionReport {
    fn from(state: &RequestState) -> Self {
        Self {
            request_id: state.id(),
            final_label: state.final_label(),
            primary_confidence: state.primary().confidence,
            secondary_label: state.secondary().map(|s| s.label),
            secondary_confidence: state.secondary().map(|s| s.confidence),
            resolution: state.resolution(),
        }
    }
}

impl std::fmt::Display for DecisionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backup = self
            .secondary_label
            .map(|l| l.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        write!(
            f,
            "Final Label: {} (main conf: {:.2}, backup: {} ({:.2}))",
            self.final_label,
            self.primary_confidence,
            backup,
            self.secondary_confidence.unwrap_or(0.0)
        )
    }
}
