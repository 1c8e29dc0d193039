//! Pipeline error types
//!
//! Only service-level failures cross the orchestrator boundary. Everything
//! the decision logic can run into (low confidence, disagreement, a bad or
//! missing arbitration answer) is absorbed inside the pipeline and never
//! shows up here.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{InputText, ServiceKind};

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Request-level failure raised by a classifier adapter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Classifier could not be reached or answered with an error status
    #[error("{service} classifier unavailable: {message}")]
    ServiceUnavailable {
        service: ServiceKind,
        message: String,
    },

    /// Classifier answered, but the answer does not map onto the label domain
    #[error("{service} classifier returned a malformed response: {message}")]
    MalformedResponse {
        service: ServiceKind,
        message: String,
    },
}

impl PipelineError {
    pub fn unavailable(service: ServiceKind, message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            service,
            message: message.into(),
        }
    }

    pub fn malformed(service: ServiceKind, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            service,
            message: message.into(),
        }
    }

    /// Failure kind, for reporting
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ServiceUnavailable { .. } => FailureKind::ServiceUnavailable,
            Self::MalformedResponse { .. } => FailureKind::MalformedResponse,
        }
    }

    /// Which classifier failed
    pub fn service(&self) -> ServiceKind {
        match self {
            Self::ServiceUnavailable { service, .. } | Self::MalformedResponse { service, .. } => {
                *service
            }
        }
    }
}

/// Failure reported by a classifier service implementation. The adapter
/// wrapping the service tags it with the service kind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ServiceError {
    pub(crate) fn into_pipeline(self, service: ServiceKind) -> PipelineError {
        match self {
            ServiceError::Unavailable(message) => PipelineError::unavailable(service, message),
            ServiceError::Malformed(message) => PipelineError::malformed(service, message),
        }
    }
}

/// Machine-readable failure kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    ServiceUnavailable,
    MalformedResponse,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServiceUnavailable => write!(f, "SERVICE_UNAVAILABLE"),
            Self::MalformedResponse => write!(f, "MALFORMED_RESPONSE"),
        }
    }
}

/// User-visible report for a failed request: failure kind plus the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFailure {
    pub kind: FailureKind,
    pub service: ServiceKind,
    pub input: String,
    pub message: String,
}

impl RequestFailure {
    pub fn new(input: &InputText, error: &PipelineError) -> Self {
        Self {
            kind: error.kind(),
            service: error.service(),
            input: input.as_str().to_string(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} (input: {:?})", self.kind, self.message, self.input)
    }
}

/// Errors loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("threshold must be a finite number in [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("max_input_units must be at least 1")]
    InvalidMaxInputUnits,

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: String, value: String },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_service() {
        let err = PipelineError::unavailable(ServiceKind::Secondary, "connection refused");
        assert_eq!(err.kind(), FailureKind::ServiceUnavailable);
        assert_eq!(err.service(), ServiceKind::Secondary);

        let err = PipelineError::malformed(ServiceKind::Primary, "unknown label LABEL_7");
        assert_eq!(err.kind(), FailureKind::MalformedResponse);
        assert_eq!(err.service(), ServiceKind::Primary);
    }

    #[test]
    fn test_error_display_names_service() {
        let err = PipelineError::unavailable(ServiceKind::Primary, "timeout");
        assert_eq!(err.to_string(), "primary classifier unavailable: timeout");
    }

    #[test]
    fn test_request_failure_reports_kind_and_input() {
        let input = InputText::new("great film").unwrap();
        let err = PipelineError::malformed(ServiceKind::Primary, "empty score list");
        let failure = RequestFailure::new(&input, &err);

        assert_eq!(failure.kind, FailureKind::MalformedResponse);
        assert_eq!(failure.input, "great film");

        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "MALFORMED_RESPONSE");
        assert_eq!(json["service"], "primary");
        assert!(failure.to_string().contains("MALFORMED_RESPONSE"));
    }
}
