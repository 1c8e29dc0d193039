//! Confidence-gated decision pipeline
//!
//! Classifies a piece of text, decides whether the prediction is trustworthy
//! enough to accept, and if not, consults a secondary classifier and, on
//! disagreement, an external arbiter.
//!
//! # Stages
//!
//! ```text
//! text ─▶ PrimaryClassifier ─▶ ConfidenceGate ─▶ FallbackResolver ─▶ RequestState
//!          (label, conf)        conf < threshold?   secondary / arbiter
//! ```
//!
//! The classifiers and the arbiter are injected as traits
//! ([`PrimaryService`], [`SecondaryService`], [`Arbiter`]), as is the record
//! sink ([`EventSink`]).
//!
//! # Usage
//!
//! ```rust,ignore
//! use gate_pipeline::{DecisionPipeline, InputText, PipelineConfig, PipelineServices, TracingSink};
//!
//! let config = PipelineConfig::default();
//! let pipeline = DecisionPipeline::new(&config, services, TracingSink::shared())?;
//! let state = pipeline.run(InputText::new("An instant classic")?).await?;
//! println!("{}", DecisionReport::from(&state));
//! ```

pub mod arbitration;
pub mod config;
pub mod error;
pub mod events;
pub mod gate;
pub mod orchestrator;
pub mod primary;
pub mod report;
pub mod resolver;
pub mod secondary;
pub mod state;
pub mod types;

pub use arbitration::{
    Arbiter, ArbiterError, ArbitrationFailure, ArbitrationOutcome, ArbitrationRequest,
    DeclineArbiter, ScriptedArbiter,
};
pub use config::PipelineConfig;
pub use error::{
    ConfigError, FailureKind, PipelineError, PipelineResult, RequestFailure, ServiceError,
};
pub use events::{
    EventSink, FanoutSink, JsonlSink, MemorySink, SharedEventSink, Stage, StageEvent, StageRecord,
    TracingSink,
};
pub use gate::{ConfidenceGate, DEFAULT_THRESHOLD};
pub use orchestrator::{DecisionPipeline, PipelineServices};
pub use primary::{PrimaryClassifier, PrimaryService, RawScore};
pub use report::DecisionReport;
pub use resolver::FallbackResolver;
pub use secondary::{SecondaryClassifier, SecondaryService, ZeroShotResponse};
pub use state::{RequestState, Resolution};
pub use types::{ClassificationResult, EmptyInput, InputText, Label, RequestId, ServiceKind};
