//! Fallback Resolver
//!
//! Stage 3. Decides the final label:
//!
//! ```text
//! GatedRequest
//!   ├─ Confident ─────────────────────▶ final = primary    (no secondary call)
//!   └─ Uncertain ─▶ secondary classifier
//!                     ├─ same label ──▶ final = secondary  (no arbitration)
//!                     └─ different ───▶ arbiter (bounded, cancellable)
//!                                        ├─ valid label L ─▶ final = L
//!                                        └─ anything else ─▶ final = secondary (safe default)
//! ```
//!
//! Only the secondary classifier can fail the request. Arbitration problems
//! (invalid answer, timeout, cancellation, dead channel) always end in the
//! safe default.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::arbitration::{ArbitrationFailure, ArbitrationOutcome, ArbitrationRequest, Arbiter};
use crate::error::PipelineResult;
use crate::events::{SharedEventSink, StageEvent, StageRecord};
use crate::secondary::SecondaryClassifier;
use crate::state::{GatedRequest, RequestState, UncertainRequest, Verdict};

/// Resolver holding the secondary classifier and the arbitration channel
#[derive(Clone)]
pub struct FallbackResolver {
    secondary: SecondaryClassifier,
    arbiter: Arc<dyn Arbiter>,
    arbitration_timeout: Duration,
}

impl FallbackResolver {
    pub fn new(
        secondary: SecondaryClassifier,
        arbiter: Arc<dyn Arbiter>,
        arbitration_timeout: Duration,
    ) -> Self {
        Self {
            secondary,
            arbiter,
            arbitration_timeout,
        }
    }

    /// Populate `secondary` (when needed) and `final_label`.
    ///
    /// Cancelling `cancel` aborts a pending arbitration wait; the request
    /// still completes via the safe default.
    pub async fn resolve(
        &self,
        request: GatedRequest,
        sink: &SharedEventSink,
        cancel: &CancellationToken,
    ) -> PipelineResult<RequestState> {
        match request {
            GatedRequest::Confident(request) => {
                let label = request.primary().label;
                let state = request.accept();
                sink.record(StageRecord::new(
                    state.id(),
                    StageEvent::PrimaryAccepted { label },
                ));
                Ok(state)
            }
            GatedRequest::Uncertain(request) => self.resolve_uncertain(request, sink, cancel).await,
        }
    }

    async fn resolve_uncertain(
        &self,
        request: UncertainRequest,
        sink: &SharedEventSink,
        cancel: &CancellationToken,
    ) -> PipelineResult<RequestState> {
        let id = request.id();
        let primary = *request.primary();

        let secondary = self.secondary.classify(request.input().as_str()).await?;
        sink.record(StageRecord::new(
            id,
            StageEvent::SecondaryClassified {
                label: secondary.label,
                confidence: secondary.confidence,
            },
        ));

        if secondary.label == primary.label {
            sink.record(StageRecord::new(
                id,
                StageEvent::ModelsAgreed {
                    label: secondary.label,
                },
            ));
            return Ok(request.resolve(secondary, Verdict::Agreement));
        }

        sink.record(StageRecord::new(
            id,
            StageEvent::ArbitrationRequested {
                primary: primary.label,
                primary_confidence: primary.confidence,
                secondary: secondary.label,
                secondary_confidence: secondary.confidence,
            },
        ));

        let arbitration = ArbitrationRequest {
            request_id: id,
            input: request.input().to_string(),
            primary,
            secondary,
        };

        let state = match self.arbitrate(&arbitration, cancel).await {
            ArbitrationOutcome::Decided { answer, label } => {
                sink.record(StageRecord::new(
                    id,
                    StageEvent::ArbitrationAccepted {
                        answer,
                        final_label: label,
                    },
                ));
                request.resolve(secondary, Verdict::Arbitrated(label))
            }
            ArbitrationOutcome::Failed { reason, answer } => {
                sink.record(StageRecord::new(
                    id,
                    StageEvent::SafeDefaultApplied {
                        reason,
                        answer,
                        final_label: secondary.label,
                    },
                ));
                request.resolve(secondary, Verdict::SafeDefault(reason))
            }
        };
        Ok(state)
    }

    /// Exactly one arbiter round trip, bounded by the timeout and the token.
    ///
    /// An already-cancelled token short-circuits without contacting the arbiter.
    async fn arbitrate(
        &self,
        request: &ArbitrationRequest,
        cancel: &CancellationToken,
    ) -> ArbitrationOutcome {
        let exchange = tokio::time::timeout(
            self.arbitration_timeout,
            self.arbiter.request_arbitration(request),
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(request_id = %request.request_id, "Arbitration cancelled");
                ArbitrationOutcome::failed(ArbitrationFailure::Cancelled)
            }
            result = exchange => match result {
                Ok(response) => ArbitrationOutcome::from_response(response),
                Err(_) => {
                    debug!(
                        request_id = %request.request_id,
                        timeout_secs = self.arbitration_timeout.as_secs(),
                        "Arbitration timed out"
                    );
                    ArbitrationOutcome::failed(ArbitrationFailure::TimedOut)
                }
            },
        }
    }
}
