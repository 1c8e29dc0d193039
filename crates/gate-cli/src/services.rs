//! HTTP adapters for the classifier services
//!
//! Transport failures and non-success statuses map to
//! [`ServiceError::Unavailable`]; bodies that do not decode map to
//! [`ServiceError::Malformed`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use gate_pipeline::{PrimaryService, RawScore, SecondaryService, ServiceError, ZeroShotResponse};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::ServiceConfig;

/// Shared POST-and-decode plumbing
#[derive(Debug, Clone)]
struct JsonEndpoint {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl JsonEndpoint {
    fn new(url: &str, config: &ServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
            token: config.api_token.clone(),
        })
    }

    async fn post<T: DeserializeOwned>(&self, body: &serde_json::Value) -> Result<T, ServiceError> {
        let mut request = self.client.post(&self.url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::Unavailable(format!("{}: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Unavailable(format!(
                "{} returned {status}: {}",
                self.url,
                body.trim()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::Unavailable(format!("{}: {e}", self.url)))?;
        serde_json::from_slice(&bytes).map_err(|e| ServiceError::Malformed(e.to_string()))
    }
}

/// Text-classification servers answer either flat or batched (one list per input).
#[derive(Deserialize)]
#[serde(untagged)]
enum ScoresPayload {
    Flat(Vec<RawScore>),
    Batched(Vec<Vec<RawScore>>),
}

impl ScoresPayload {
    fn into_scores(self) -> Vec<RawScore> {
        match self {
            Self::Flat(scores) => scores,
            Self::Batched(batches) => batches.into_iter().next().unwrap_or_default(),
        }
    }
}

/// Primary sentiment classifier behind an inference endpoint
#[derive(Debug, Clone)]
pub struct HttpPrimaryService {
    endpoint: JsonEndpoint,
}

impl HttpPrimaryService {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        Ok(Self {
            endpoint: JsonEndpoint::new(&config.primary_url, config)?,
        })
    }
}

#[async_trait]
impl PrimaryService for HttpPrimaryService {
    async fn predict(&self, text: &str, max_length: usize) -> Result<Vec<RawScore>, ServiceError> {
        let body = json!({
            "inputs": text,
            "parameters": {
                "truncation": true,
                "max_length": max_length,
                "top_k": null,
            },
        });
        let payload: ScoresPayload = self.endpoint.post(&body).await?;
        let scores = payload.into_scores();
        debug!(url = %self.endpoint.url, count = scores.len(), "Primary scores received");
        Ok(scores)
    }
}

/// Zero-shot classifier behind an inference endpoint
#[derive(Debug, Clone)]
pub struct HttpZeroShotService {
    endpoint: JsonEndpoint,
}

impl HttpZeroShotService {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        Ok(Self {
            endpoint: JsonEndpoint::new(&config.secondary_url, config)?,
        })
    }
}

#[async_trait]
impl SecondaryService for HttpZeroShotService {
    async fn predict(
        &self,
        text: &str,
        candidate_labels: &[&str],
    ) -> Result<ZeroShotResponse, ServiceError> {
        let body = json!({
            "inputs": text,
            "parameters": { "candidate_labels": candidate_labels },
        });
        let response: ZeroShotResponse = self.endpoint.post(&body).await?;
        debug!(url = %self.endpoint.url, labels = ?response.labels, "Zero-shot scores received");
        Ok(response)
    }
}
