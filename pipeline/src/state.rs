//! Per-request state record
//!
//! A request moves through one type per stage. Each type exposes only the
//! fields written so far, and the only way forward is a consuming transition,
//! so a field can be written once and never overwritten:
//!
//! ```text
//! PendingRequest ──classified()──▶ ClassifiedRequest ──gated()──▶ GatedRequest
//!                                                                   │
//!                          ┌────────────────────────────────────────┤
//!                          ▼                                        ▼
//!              ConfidentRequest::accept()           UncertainRequest::resolve()
//!                          │                                        │
//!                          └──────────────▶ RequestState ◀──────────┘
//! ```
//!
//! `secondary` can only be set through `UncertainRequest`, which only exists
//! when the gate asked for a fallback. The transitions are crate-private, so
//! code outside the pipeline can read a record but never assemble one:
//!
//! ```compile_fail
//! use gate_pipeline::state::PendingRequest;
//! use gate_pipeline::{ClassificationResult, InputText, Label};
//!
//! let input = InputText::new("Skips the gate").unwrap();
//! let primary = ClassificationResult::new(Label::Positive, 0.10).unwrap();
//! let _ = PendingRequest::new(input).classified(primary);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::arbitration::ArbitrationFailure;
use crate::types::{ClassificationResult, InputText, Label, RequestId};

/// How the final label was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    /// Primary was confident; secondary never consulted
    Accepted,
    /// Secondary agreed with primary
    Agreement,
    /// Models disagreed and the arbiter named a valid label
    Arbitrated,
    /// Models disagreed and arbitration produced no valid answer
    SafeDefault { reason: ArbitrationFailure },
}

impl Resolution {
    /// Whether an arbiter was consulted
    pub fn arbitration_requested(&self) -> bool {
        matches!(self, Resolution::Arbitrated | Resolution::SafeDefault { .. })
    }
}

/// How stage 3 settled an uncertain request. The final label follows from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// Secondary agreed with primary
    Agreement,
    /// The arbiter named this label
    Arbitrated(Label),
    /// Fall back to the secondary label
    SafeDefault(ArbitrationFailure),
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Accepted => write!(f, "accepted"),
            Resolution::Agreement => write!(f, "agreement"),
            Resolution::Arbitrated => write!(f, "arbitrated"),
            Resolution::SafeDefault { reason } => write!(f, "safe_default({})", reason),
        }
    }
}

/// Request at pipeline entry: only the input is known.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    id: RequestId,
    input: InputText,
    started_at: DateTime<Utc>,
}

impl PendingRequest {
    pub fn new(input: InputText) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            input,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn input(&self) -> &InputText {
        &self.input
    }

    /// Record the primary prediction (stage 1).
    pub(crate) fn classified(self, primary: ClassificationResult) -> ClassifiedRequest {
        ClassifiedRequest {
            id: self.id,
            input: self.input,
            started_at: self.started_at,
            primary,
        }
    }
}

/// Request after the primary classifier ran.
#[derive(Debug, Clone)]
pub struct ClassifiedRequest {
    id: RequestId,
    input: InputText,
    started_at: DateTime<Utc>,
    primary: ClassificationResult,
}

impl ClassifiedRequest {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn input(&self) -> &InputText {
        &self.input
    }

    pub fn primary(&self) -> &ClassificationResult {
        &self.primary
    }

    /// Record the gate decision (stage 2).
    pub(crate) fn gated(self, fallback_needed: bool) -> GatedRequest {
        let common = Gated {
            id: self.id,
            input: self.input,
            started_at: self.started_at,
            primary: self.primary,
        };
        if fallback_needed {
            GatedRequest::Uncertain(UncertainRequest(common))
        } else {
            GatedRequest::Confident(ConfidentRequest(common))
        }
    }
}

#[derive(Debug, Clone)]
struct Gated {
    id: RequestId,
    input: InputText,
    started_at: DateTime<Utc>,
    primary: ClassificationResult,
}

impl Gated {
    fn finish(
        self,
        fallback_needed: bool,
        secondary: Option<ClassificationResult>,
        final_label: Label,
        resolution: Resolution,
    ) -> RequestState {
        RequestState {
            id: self.id,
            input: self.input,
            primary: self.primary,
            fallback_needed,
            secondary,
            final_label,
            resolution,
            started_at: self.started_at,
            completed_at: Utc::now(),
        }
    }
}

/// Request after the gate ran; the variant is the gate's decision.
#[derive(Debug, Clone)]
pub enum GatedRequest {
    Confident(ConfidentRequest),
    Uncertain(UncertainRequest),
}

impl GatedRequest {
    fn common(&self) -> &Gated {
        match self {
            GatedRequest::Confident(r) => &r.0,
            GatedRequest::Uncertain(r) => &r.0,
        }
    }

    pub fn id(&self) -> RequestId {
        self.common().id
    }

    pub fn input(&self) -> &InputText {
        &self.common().input
    }

    pub fn primary(&self) -> &ClassificationResult {
        &self.common().primary
    }

    pub fn fallback_needed(&self) -> bool {
        matches!(self, GatedRequest::Uncertain(_))
    }
}

/// Gated request whose primary prediction met the threshold
#[derive(Debug, Clone)]
pub struct ConfidentRequest(Gated);

impl ConfidentRequest {
    pub fn primary(&self) -> &ClassificationResult {
        &self.0.primary
    }

    /// Adopt the primary label as final.
    pub(crate) fn accept(self) -> RequestState {
        let label = self.0.primary.label;
        self.0.finish(false, None, label, Resolution::Accepted)
    }
}

/// Gated request whose primary prediction fell below the threshold
#[derive(Debug, Clone)]
pub struct UncertainRequest(Gated);

impl UncertainRequest {
    pub fn id(&self) -> RequestId {
        self.0.id
    }

    pub fn input(&self) -> &InputText {
        &self.0.input
    }

    pub fn primary(&self) -> &ClassificationResult {
        &self.0.primary
    }

    /// Record the secondary prediction and settle the final label (stage 3).
    ///
    /// Agreement requires the secondary label to match the primary one; a
    /// mismatched agreement is recorded as a safe default instead.
    pub(crate) fn resolve(self, secondary: ClassificationResult, verdict: Verdict) -> RequestState {
        let (final_label, resolution) = match verdict {
            Verdict::Agreement if secondary.label == self.0.primary.label => {
                (secondary.label, Resolution::Agreement)
            }
            Verdict::Agreement => (
                secondary.label,
                Resolution::SafeDefault {
                    reason: ArbitrationFailure::InvalidResponse,
                },
            ),
            Verdict::Arbitrated(label) => (label, Resolution::Arbitrated),
            Verdict::SafeDefault(reason) => (secondary.label, Resolution::SafeDefault { reason }),
        };
        self.0.finish(true, Some(secondary), final_label, resolution)
    }
}

/// Completed request record
#[derive(Debug, Clone, Serialize)]
pub struct RequestState {
    id: RequestId,
    input: InputText,
    primary: ClassificationResult,
    fallback_needed: bool,
    secondary: Option<ClassificationResult>,
    final_label: Label,
    resolution: Resolution,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
}

impl RequestState {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn input(&self) -> &InputText {
        &self.input
    }

    pub fn primary(&self) -> &ClassificationResult {
        &self.primary
    }

    pub fn fallback_needed(&self) -> bool {
        self.fallback_needed
    }

    pub fn secondary(&self) -> Option<&ClassificationResult> {
        self.secondary.as_ref()
    }

    pub fn final_label(&self) -> Label {
        self.final_label
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// Compare everything except the request id and timestamps.
    pub fn same_decision(&self, other: &RequestState) -> bool {
        self.input == other.input
            && self.primary == other.primary
            && self.fallback_needed == other.fallback_needed
            && self.secondary == other.secondary
            && self.final_label == other.final_label
            && self.resolution == other.resolution
    }
}
