//! Confidence Gate: the single escalation policy point
//!
//! Pure and total: one numeric comparison against the configured threshold.
//! No other component reads the threshold.

use crate::error::ConfigError;
use crate::events::{SharedEventSink, StageEvent, StageRecord};
use crate::state::{ClassifiedRequest, GatedRequest};
use crate::types::ClassificationResult;

/// Default threshold separating confident from uncertain primary predictions
pub const DEFAULT_THRESHOLD: f64 = 0.70;

/// `true` (fallback needed) iff `result.confidence < threshold`.
pub fn decide(result: &ClassificationResult, threshold: f64) -> bool {
    result.confidence < threshold
}

/// Gate holding a validated threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceGate {
    threshold: f64,
}

impl ConfidenceGate {
    /// Create a gate. The threshold must be finite and within `[0, 1]`.
    pub fn new(threshold: f64) -> Result<Self, ConfigError> {
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        Ok(Self { threshold })
    }

    /// Whether `result` needs the fallback path
    pub fn decide(&self, result: &ClassificationResult) -> bool {
        decide(result, self.threshold)
    }

    /// Stage 2: record the gate decision on the request.
    pub fn evaluate(&self, request: ClassifiedRequest, sink: &SharedEventSink) -> GatedRequest {
        let confidence = request.primary().confidence;
        let fallback_needed = self.decide(request.primary());

        sink.record(StageRecord::new(
            request.id(),
            StageEvent::GateEvaluated {
                confidence,
                threshold: self.threshold,
                fallback_needed,
            },
        ));

        request.gated(fallback_needed)
    }
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}
