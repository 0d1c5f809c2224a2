//! Client for the upstream moderation API.
//!
//! Wraps one network round trip per call, with bounded retry on transient
//! failures. Exhausting the retry budget degrades to an explicit
//! "unavailable" outcome (`Ok(None)`) so batch callers can skip the message
//! instead of aborting.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;

use crate::category::Category;
use crate::error::ModerationError;
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::types::CategoryScores;

/// Environment variable checked before falling back to a key file.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Scoring capability consumed by the batch orchestrator and the service
/// facade. `Ok(None)` means the scorer was unavailable after exhausting its
/// retry budget; callers treat it as "skip this message".
#[async_trait]
pub trait ModerationCapability: Send + Sync {
    async fn moderate(&self, content: &str) -> Result<Option<CategoryScores>, ModerationError>;
}

/// Configuration for [`ModerationClient`].
#[derive(Debug, Clone)]
pub struct ModerationConfig {
    pub base_url: String,
    pub api_key: SecretString,
    /// Moderation model; the upstream default is used when unset.
    pub model: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl ModerationConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: SecretString::from(api_key.into()),
            model: None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    /// Resolve the API credential at construction time: environment variable
    /// first, then the trimmed contents of `key_file`. Absence of both is a
    /// fatal configuration error.
    pub fn resolve(key_file: Option<&Path>) -> Result<Self, ModerationError> {
        if let Ok(key) = std::env::var(API_KEY_ENV)
            && !key.trim().is_empty()
        {
            return Ok(Self::new(key.trim().to_string()));
        }

        let Some(path) = key_file else {
            return Err(ModerationError::Config(format!(
                "no API key: {API_KEY_ENV} is unset and no key file was given"
            )));
        };
        let key = std::fs::read_to_string(path).map_err(|e| {
            ModerationError::Config(format!("cannot read key file {}: {e}", path.display()))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ModerationError::Config(format!(
                "key file {} is empty",
                path.display()
            )));
        }
        Ok(Self::new(key.to_string()))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Wire response from the upstream moderations endpoint.
#[derive(Debug, Deserialize)]
struct WireModerationResponse {
    results: Vec<WireModerationResult>,
}

#[derive(Debug, Deserialize)]
struct WireModerationResult {
    category_scores: HashMap<String, f64>,
}

/// HTTP client for the upstream moderation API.
#[derive(Debug, Clone)]
pub struct ModerationClient {
    config: ModerationConfig,
    http_client: reqwest::Client,
}

impl ModerationClient {
    pub fn new(config: ModerationConfig) -> Result<Self, ModerationError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModerationError::Config(format!("cannot build http client: {e}")))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// One scoring round trip, no retry.
    async fn score_once(&self, content: &str) -> Result<CategoryScores, ModerationError> {
        let url = format!("{}/moderations", self.config.base_url);
        let mut body = serde_json::json!({ "input": content });
        if let Some(model) = &self.config.model {
            body["model"] = serde_json::Value::String(model.clone());
        }

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ModerationError::Connection(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::classify_response_error(response).await);
        }

        let wire: WireModerationResponse = response
            .json()
            .await
            .map_err(|e| ModerationError::Parse(format!("cannot decode response: {e}")))?;
        let result = wire
            .results
            .into_iter()
            .next()
            .ok_or_else(|| ModerationError::Parse("response carried no results".to_string()))?;

        // Keep only catalog categories; upstream subcategory keys like
        // "hate/threatening" are not part of our taxonomy.
        let scores: CategoryScores = result
            .category_scores
            .into_iter()
            .filter_map(|(name, score)| {
                name.parse::<Category>().ok().map(|category| (category, score))
            })
            .collect();
        Ok(scores)
    }

    async fn classify_response_error(response: reqwest::Response) -> ModerationError {
        let status = response.status().as_u16();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());

        match status {
            400 => ModerationError::api_error(400, format!("bad request: {error_text}")),
            401 => ModerationError::Authentication("invalid API key".to_string()),
            429 => ModerationError::RateLimited(format!("rate limit exceeded: {error_text}")),
            _ => ModerationError::api_error(status, error_text),
        }
    }
}

#[async_trait]
impl ModerationCapability for ModerationClient {
    async fn moderate(&self, content: &str) -> Result<Option<CategoryScores>, ModerationError> {
        let executor = RetryExecutor::new(self.config.retry.clone());
        match executor.execute(|| self.score_once(content)).await {
            Ok(scores) => Ok(Some(scores)),
            // A retryable error surviving the executor means the attempt
            // budget is spent; degrade to "unavailable" per contract.
            Err(error) if error.is_retryable() => {
                tracing::warn!(%error, "retries exhausted, content left unscored");
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }
}
