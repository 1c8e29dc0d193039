//! Stage event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::arbitration::ArbitrationFailure;
use crate::types::{Label, RequestId};

/// Pipeline stage that produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Inference,
    ConfidenceCheck,
    Fallback,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Inference => write!(f, "inference"),
            Stage::ConfidenceCheck => write!(f, "confidence_check"),
            Stage::Fallback => write!(f, "fallback"),
        }
    }
}

/// Record severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Debug,
    Info,
    Warn,
}

/// Everything a stage can report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageEvent {
    /// Primary classifier produced a prediction
    PrimaryClassified {
        input: String,
        label: Label,
        confidence: f64,
        truncated: bool,
    },

    /// Gate compared the primary confidence against the threshold
    GateEvaluated {
        confidence: f64,
        threshold: f64,
        fallback_needed: bool,
    },

    /// Primary prediction accepted without consulting the secondary model
    PrimaryAccepted { label: Label },

    /// Secondary classifier produced a prediction
    SecondaryClassified { label: Label, confidence: f64 },

    /// Both models named the same label
    ModelsAgreed { label: Label },

    /// Models disagreed; arbitration is being requested
    ArbitrationRequested {
        primary: Label,
        primary_confidence: f64,
        secondary: Label,
        secondary_confidence: f64,
    },

    /// Arbiter named a valid label
    ArbitrationAccepted { answer: String, final_label: Label },

    /// Arbitration produced no valid answer; secondary label adopted
    SafeDefaultApplied {
        reason: ArbitrationFailure,
        answer: Option<String>,
        final_label: Label,
    },
}

impl StageEvent {
    /// Stage this event belongs to
    pub fn stage(&self) -> Stage {
        match self {
            StageEvent::PrimaryClassified { .. } => Stage::Inference,
            StageEvent::GateEvaluated { .. } => Stage::ConfidenceCheck,
            StageEvent::PrimaryAccepted { .. }
            | StageEvent::SecondaryClassified { .. }
            | StageEvent::ModelsAgreed { .. }
            | StageEvent::ArbitrationRequested { .. }
            | StageEvent::ArbitrationAccepted { .. }
            | StageEvent::SafeDefaultApplied { .. } => Stage::Fallback,
        }
    }

    /// Default severity for this event
    pub fn severity(&self) -> Severity {
        match self {
            StageEvent::GateEvaluated {
                fallback_needed: false,
                ..
            } => Severity::Debug,
            StageEvent::SafeDefaultApplied { .. } => Severity::Warn,
            _ => Severity::Info,
        }
    }

    /// Short event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            StageEvent::PrimaryClassified { .. } => "primary_classified",
            StageEvent::GateEvaluated { .. } => "gate_evaluated",
            StageEvent::PrimaryAccepted { .. } => "primary_accepted",
            StageEvent::SecondaryClassified { .. } => "secondary_classified",
            StageEvent::ModelsAgreed { .. } => "models_agreed",
            StageEvent::ArbitrationRequested { .. } => "arbitration_requested",
            StageEvent::ArbitrationAccepted { .. } => "arbitration_accepted",
            StageEvent::SafeDefaultApplied { .. } => "safe_default_applied",
        }
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        match self {
            StageEvent::PrimaryClassified {
                input,
                label,
                confidence,
                truncated,
            } => format!(
                "Input: {} | Predicted: {} | Confidence: {:.2}{}",
                input,
                label,
                confidence,
                if *truncated { " | truncated" } else { "" }
            ),
            StageEvent::GateEvaluated {
                confidence,
                threshold,
                fallback_needed: true,
            } => format!(
                "Low confidence ({:.2} < {:.2}). Triggering fallback",
                confidence, threshold
            ),
            StageEvent::GateEvaluated {
                confidence,
                threshold,
                fallback_needed: false,
            } => format!("Confidence {:.2} meets threshold {:.2}", confidence, threshold),
            StageEvent::PrimaryAccepted { label } => format!("Accepted prediction: {}", label),
            StageEvent::SecondaryClassified { label, confidence } => format!(
                "Backup model prediction: {} | Confidence: {:.2}",
                label, confidence
            ),
            StageEvent::ModelsAgreed { label } => {
                format!("Backup agrees with main model, accepting {}", label)
            }
            StageEvent::ArbitrationRequested {
                primary,
                primary_confidence,
                secondary,
                secondary_confidence,
            } => format!(
                "Models disagree: main = {} ({:.2}), backup = {} ({:.2})",
                primary, primary_confidence, secondary, secondary_confidence
            ),
            StageEvent::ArbitrationAccepted {
                answer,
                final_label,
            } => format!("Arbiter answered {:?}, final label: {}", answer, final_label),
            StageEvent::SafeDefaultApplied {
                reason,
                final_label,
                ..
            } => format!(
                "Arbitration {}, keeping backup prediction: {}",
                reason, final_label
            ),
        }
    }
}

/// A stage event with its envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub request_id: RequestId,
    pub stage: Stage,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: StageEvent,
}

impl StageRecord {
    pub fn new(request_id: RequestId, event: StageEvent) -> Self {
        Self {
            request_id,
            stage: event.stage(),
            severity: event.severity(),
            timestamp: Utc::now(),
            event,
        }
    }
}
