//! Arbitration capability
//!
//! When the primary and secondary models disagree, the resolver hands both
//! predictions to an injected [`Arbiter`] and waits for a free-form answer.
//! The answer is validated against the label set here; anything that is not
//! a valid label becomes an [`ArbitrationFailure`], which the resolver turns
//! into the safe default.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ClassificationResult, Label, RequestId};

/// Why arbitration produced no usable label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbitrationFailure {
    /// Empty, malformed, or out-of-set answer
    InvalidResponse,
    /// No answer within the configured bound
    TimedOut,
    /// Request was cancelled while waiting
    Cancelled,
    /// Arbiter could not be reached or declined to answer
    ArbiterUnavailable,
}

impl std::fmt::Display for ArbitrationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidResponse => write!(f, "returned an invalid answer"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Cancelled => write!(f, "was cancelled"),
            Self::ArbiterUnavailable => write!(f, "was unavailable"),
        }
    }
}

/// Transport-level failure of an arbiter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArbiterError {
    #[error("arbitration channel closed")]
    Closed,

    #[error("arbiter declined to answer")]
    Declined,

    #[error("arbitration channel I/O failed: {0}")]
    Io(String),
}

/// Both predictions, presented to the arbiter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationRequest {
    pub request_id: RequestId,
    pub input: String,
    pub primary: ClassificationResult,
    pub secondary: ClassificationResult,
}

impl ArbitrationRequest {
    /// Human-facing prompt text
    pub fn prompt(&self) -> String {
        let mut prompt = String::new();
        prompt.push_str(&format!("Review: {}\n", self.input));
        prompt.push_str(&format!(
            "Main model = {} (conf: {:.2}), Backup model = {} (conf: {:.2})\n",
            self.primary.label,
            self.primary.confidence,
            self.secondary.label,
            self.secondary.confidence
        ));
        prompt.push_str(&format!(
            "They disagree. Please clarify ({}): ",
            Label::candidate_names().join("/")
        ));
        prompt
    }
}

/// Interpreted arbitration result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArbitrationOutcome {
    /// The arbiter named a valid label
    Decided { answer: String, label: Label },
    /// No usable label; `answer` holds the raw text when there was one
    Failed {
        reason: ArbitrationFailure,
        answer: Option<String>,
    },
}

impl ArbitrationOutcome {
    /// Validate a raw arbiter response.
    pub fn from_response(response: Result<String, ArbiterError>) -> Self {
        match response {
            Ok(answer) => match Label::parse_answer(&answer) {
                Some(label) => Self::Decided { answer, label },
                None => Self::Failed {
                    reason: ArbitrationFailure::InvalidResponse,
                    answer: Some(answer),
                },
            },
            Err(_) => Self::Failed {
                reason: ArbitrationFailure::ArbiterUnavailable,
                answer: None,
            },
        }
    }

    pub fn failed(reason: ArbitrationFailure) -> Self {
        Self::Failed {
            reason,
            answer: None,
        }
    }
}

/// External decision-maker consulted on disagreement
#[async_trait]
pub trait Arbiter: Send + Sync {
    /// One blocking round trip: present both predictions, return the raw answer.
    async fn request_arbitration(&self, request: &ArbitrationRequest)
        -> Result<String, ArbiterError>;
}

/// Arbiter that never answers, so every disagreement takes the safe default.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclineArbiter;

#[async_trait]
impl Arbiter for DeclineArbiter {
    async fn request_arbitration(
        &self,
        _request: &ArbitrationRequest,
    ) -> Result<String, ArbiterError> {
        Err(ArbiterError::Declined)
    }
}

/// Arbiter replaying a fixed script of answers, for tests and demos.
///
/// Once the script runs out every call returns [`ArbiterError::Closed`].
#[derive(Debug, Default)]
pub struct ScriptedArbiter {
    script: Mutex<VecDeque<Result<String, ArbiterError>>>,
    requests: Mutex<Vec<ArbitrationRequest>>,
    calls: AtomicUsize,
}

impl ScriptedArbiter {
    pub fn new<I>(answers: I) -> Self
    where
        I: IntoIterator<Item = Result<String, ArbiterError>>,
    {
        Self {
            script: Mutex::new(answers.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Script of plain text answers
    pub fn answering<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(answers.into_iter().map(|a| Ok(a.into())))
    }

    /// Number of arbitration requests received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<ArbitrationRequest> {
        match self.requests.lock() {
            Ok(r) => r.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Arbiter for ScriptedArbiter {
    async fn request_arbitration(
        &self,
        request: &ArbitrationRequest,
    ) -> Result<String, ArbiterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.requests.lock() {
            Ok(mut r) => r.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }
        let next = match self.script.lock() {
            Ok(mut s) => s.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        next.unwrap_or(Err(ArbiterError::Closed))
    }
}
