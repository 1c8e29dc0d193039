//! Record sinks

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::types::{Severity, StageRecord};

/// Shared reference to an event sink
pub type SharedEventSink = Arc<dyn EventSink>;

/// Append-only destination for stage records
pub trait EventSink: Send + Sync {
    /// Append one record. Sinks swallow their own I/O failures; a broken
    /// log must never fail a request.
    fn record(&self, record: StageRecord);
}

/// Forwards records to `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
    pub fn shared() -> SharedEventSink {
        Arc::new(Self)
    }
}

impl EventSink for TracingSink {
    fn record(&self, record: StageRecord) {
        let request_id = record.request_id.to_string();
        let stage = record.stage.to_string();
        let event_type = record.event.event_type();
        let summary = record.event.summary();
        match record.severity {
            Severity::Debug => debug!(%request_id, %stage, event_type, "{}", summary),
            Severity::Info => info!(%request_id, %stage, event_type, "{}", summary),
            Severity::Warn => warn!(%request_id, %stage, event_type, "{}", summary),
        }
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl JsonlSink {
    /// Open (creating if needed) a JSONL file in append mode.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonlSink {
    fn record(&self, record: StageRecord) {
        let json = match serde_json::to_string(&record) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize stage record: {e}");
                return;
            }
        };
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(file, "{json}") {
            warn!(path = %self.path.display(), "Failed to append stage record: {e}");
        }
    }
}

/// Keeps records in memory. Used by tests and by callers that want to
/// inspect a request's trail after the fact.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<StageRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn records(&self) -> Vec<StageRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemorySink {
    fn record(&self, record: StageRecord) {
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}

/// Sends every record to each wrapped sink in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<SharedEventSink>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: SharedEventSink) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn shared(self) -> SharedEventSink {
        Arc::new(self)
    }
}

impl EventSink for FanoutSink {
    fn record(&self, record: StageRecord) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.record(record.clone());
            }
            last.record(record);
        }
    }
}
