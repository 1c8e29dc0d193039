//! Pipeline Orchestrator
//!
//! Runs primary classification → confidence gate → fallback resolution, in
//! that order, exactly once each, for a single input. Holds no per-request
//! state, so one orchestrator can serve concurrent requests.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::arbitration::Arbiter;
use crate::config::PipelineConfig;
use crate::error::{ConfigError, PipelineResult};
use crate::events::SharedEventSink;
use crate::gate::ConfidenceGate;
use crate::primary::{PrimaryClassifier, PrimaryService};
use crate::resolver::FallbackResolver;
use crate::secondary::{SecondaryClassifier, SecondaryService};
use crate::state::{PendingRequest, RequestState};
use crate::types::InputText;

/// External collaborators the pipeline is wired to
#[derive(Clone)]
pub struct PipelineServices {
    pub primary: Arc<dyn PrimaryService>,
    pub secondary: Arc<dyn SecondaryService>,
    pub arbiter: Arc<dyn Arbiter>,
}

/// The three-stage decision pipeline
#[derive(Clone)]
pub struct DecisionPipeline {
    primary: PrimaryClassifier,
    gate: ConfidenceGate,
    resolver: FallbackResolver,
    sink: SharedEventSink,
}

impl DecisionPipeline {
    /// Wire the stages from a validated config.
    pub fn new(
        config: &PipelineConfig,
        services: PipelineServices,
        sink: SharedEventSink,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_parts(
            PrimaryClassifier::new(services.primary, config.max_input_units),
            config.gate()?,
            FallbackResolver::new(
                SecondaryClassifier::new(services.secondary),
                services.arbiter,
                config.arbitration_timeout(),
            ),
            sink,
        ))
    }

    /// Assemble from already-built stages.
    pub fn from_parts(
        primary: PrimaryClassifier,
        gate: ConfidenceGate,
        resolver: FallbackResolver,
        sink: SharedEventSink,
    ) -> Self {
        Self {
            primary,
            gate,
            resolver,
            sink,
        }
    }

    /// Run one input through all three stages.
    pub async fn run(&self, input: InputText) -> PipelineResult<RequestState> {
        self.run_with_cancel(input, &CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), with a token that aborts a pending arbitration wait.
    pub async fn run_with_cancel(
        &self,
        input: InputText,
        cancel: &CancellationToken,
    ) -> PipelineResult<RequestState> {
        let request = PendingRequest::new(input);
        let span = info_span!("request", request_id = %request.id());

        async move {
            let result = self.run_stages(request, cancel).await;
            match &result {
                Ok(state) => info!(
                    final_label = %state.final_label(),
                    resolution = %state.resolution(),
                    "Request completed"
                ),
                Err(e) => warn!(kind = %e.kind(), "Request failed: {e}"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        request: PendingRequest,
        cancel: &CancellationToken,
    ) -> PipelineResult<RequestState> {
        let classified = self.primary.run(request, &self.sink).await?;
        let gated = self.gate.evaluate(classified, &self.sink);
        self.resolver.resolve(gated, &self.sink, cancel).await
    }
}
