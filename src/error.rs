//! Error types for the moderation pipeline.
//!
//! A single error enum covers the whole crate; `is_retryable()` drives the
//! retry executor's classification of transient upstream failures.

use thiserror::Error;

/// Errors produced by the moderation pipeline.
#[derive(Debug, Clone, Error)]
pub enum ModerationError {
    /// One or more requested category tokens are not part of the catalog.
    /// Fatal at the process boundary.
    #[error("invalid categories {invalid:?}, choose from {valid:?}")]
    InvalidCategories {
        invalid: Vec<String>,
        valid: Vec<&'static str>,
    },

    /// Upstream rate limit (HTTP 429). Transient.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Connection-level failure (DNS, refused, reset, timeout). Transient.
    #[error("connection error: {0}")]
    Connection(String),

    /// Credential rejected, either by the upstream scorer or at our own
    /// transport boundary.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Non-transient upstream API fault.
    #[error("api error {code}: {message}")]
    Api { code: u16, message: String },

    /// Upstream response body could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// Missing or unusable configuration (credentials, bind address).
    #[error("configuration error: {0}")]
    Config(String),

    /// File-level failure reading or writing batch inputs/outputs.
    #[error("io error: {0}")]
    Io(String),

    /// Anything that does not fit the taxonomy above.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ModerationError {
    /// Build an API error from a status code and message.
    pub fn api_error(code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    /// Whether the failure is expected to resolve itself on retry.
    ///
    /// Rate limits, connection failures and upstream 5xx responses qualify;
    /// everything else is propagated immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::Connection(_) => true,
            Self::Api { code, .. } => (500..=599).contains(code),
            _ => false,
        }
    }

    /// HTTP status associated with this error, when one exists.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RateLimited(_) => Some(429),
            Self::Authentication(_) => Some(401),
            Self::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ModerationError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ModerationError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<reqwest::Error> for ModerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            Self::Connection(e.to_string())
        } else if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Internal(e.to_string())
        }
    }
}
