//! Core value types shared by every stage of the pipeline.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Unique identifier correlating every record emitted for one request
pub type RequestId = uuid::Uuid;

/// Sentiment label in the fixed two-label domain.
///
/// Variant order is significant: it is the label-index order of the primary
/// model and the tie-break order (`Negative` sorts first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    Negative,
    Positive,
}

impl Label {
    /// All labels in enumeration order
    pub fn all() -> &'static [Label] {
        &[Label::Negative, Label::Positive]
    }

    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Negative => "NEGATIVE",
            Label::Positive => "POSITIVE",
        }
    }

    /// Label for a primary-model class index (`LABEL_0`, `LABEL_1`, ...)
    pub fn from_index(index: usize) -> Option<Label> {
        Label::all().get(index).copied()
    }

    /// Candidate labels handed to the zero-shot classifier.
    pub fn candidate_names() -> [&'static str; 2] {
        ["POSITIVE", "NEGATIVE"]
    }

    /// Parse a free-form answer: trimmed, case-insensitive, canonical names only.
    pub fn parse_answer(raw: &str) -> Option<Label> {
        raw.trim().parse().ok()
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when text does not name a known label
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown label: {0:?}")]
pub struct UnknownLabel(pub String);

impl FromStr for Label {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NEGATIVE" => Ok(Label::Negative),
            "POSITIVE" => Ok(Label::Positive),
            _ => Err(UnknownLabel(s.to_string())),
        }
    }
}

/// A single classifier prediction: top label plus self-reported confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: Label,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
}

impl ClassificationResult {
    /// Build a result, rejecting confidences that are not finite or outside `[0, 1]`.
    pub fn new(label: Label, confidence: f64) -> Option<Self> {
        if confidence.is_finite() && (0.0..=1.0).contains(&confidence) {
            Some(Self { label, confidence })
        } else {
            None
        }
    }
}

impl std::fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (conf: {:.2})", self.label, self.confidence)
    }
}

/// Which external classifier a failure or record refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Primary,
    Secondary,
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceKind::Primary => write!(f, "primary"),
            ServiceKind::Secondary => write!(f, "secondary"),
        }
    }
}

/// Input was empty or whitespace only
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("input text must not be empty")]
pub struct EmptyInput;

/// Request text, guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InputText(String);

impl InputText {
    /// Validate raw text. Surrounding whitespace is kept; all-whitespace is rejected.
    pub fn new(text: impl Into<String>) -> Result<Self, EmptyInput> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(EmptyInput);
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InputText {
    type Error = EmptyInput;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InputText> for String {
    fn from(value: InputText) -> Self {
        value.0
    }
}

impl std::fmt::Display for InputText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
