//! Stage records for the decision pipeline
//!
//! Every stage reports what it did as a [`StageEvent`], wrapped in a
//! [`StageRecord`] carrying the request id, severity and timestamp. Records go
//! to an injected [`EventSink`]; the pipeline never reads them back.
//!
//! # Record Flow
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │    Stage     │────▶│  EventSink   │────▶│ tracing /    │
//! │  (record)    │     │  (injected)  │     │ JSONL file   │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! At least one record is emitted per stage per request.

pub mod sink;
pub mod types;

pub use sink::{EventSink, FanoutSink, JsonlSink, MemorySink, SharedEventSink, TracingSink};
pub use types::{Severity, Stage, StageEvent, StageRecord};
