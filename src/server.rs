//! HTTP service facade for single-message moderation.
//!
//! One endpoint, `POST /moderate`: bearer-token auth against a
//! process-configured secret, delegation to the moderation client for the
//! full catalog, then projection down to the requested categories.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use secrecy::{ExposeSecret, SecretString};

use crate::client::ModerationCapability;
use crate::error::ModerationError;
use crate::types::{CategoryScores, ModerateRequest, ModerateResponse};

/// Environment variable holding the service's bearer secret.
pub const SERVICE_TOKEN_ENV: &str = "MODKIT_API_TOKEN";

/// Shared state for the service.
#[derive(Clone)]
pub struct AppState {
    token: SecretString,
    scorer: Arc<dyn ModerationCapability>,
}

impl AppState {
    pub fn new(token: impl Into<String>, scorer: Arc<dyn ModerationCapability>) -> Self {
        Self {
            token: SecretString::from(token.into()),
            scorer,
        }
    }

    /// Resolve the bearer secret from the environment; absence is a fatal
    /// configuration error at startup.
    pub fn from_env(scorer: Arc<dyn ModerationCapability>) -> Result<Self, ModerationError> {
        let token = std::env::var(SERVICE_TOKEN_ENV).map_err(|_| {
            ModerationError::Config(format!("{SERVICE_TOKEN_ENV} is not set"))
        })?;
        if token.trim().is_empty() {
            return Err(ModerationError::Config(format!(
                "{SERVICE_TOKEN_ENV} is empty"
            )));
        }
        Ok(Self::new(token, scorer))
    }
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/moderate", post(moderate_message))
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), ModerationError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ModerationError::Config(format!("cannot bind {addr}: {e}")))?;
    tracing::info!(%addr, "moderation service listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ModerationError::Internal(e.to_string()))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

/// Transport-level failures for the moderation endpoint.
enum ApiFailure {
    /// Missing or mismatched bearer credential.
    Unauthorized,
    /// Upstream scorer unavailable (retries exhausted or faulted).
    Unavailable(String),
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiFailure::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "Invalid API key.".to_string())
            }
            ApiFailure::Unavailable(detail) => (StatusCode::TOO_MANY_REQUESTS, detail),
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

fn verify_bearer(headers: &HeaderMap, token: &SecretString) -> Result<(), ApiFailure> {
    let supplied = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiFailure::Unauthorized)?;
    if supplied == token.expose_secret() {
        Ok(())
    } else {
        Err(ApiFailure::Unauthorized)
    }
}

/// `POST /moderate`
///
/// Unknown category tokens never reach this handler: serde rejects them
/// while deserializing the request body.
async fn moderate_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ModerateRequest>,
) -> Result<Json<ModerateResponse>, ApiFailure> {
    verify_bearer(&headers, &state.token)?;

    let scores = match state.scorer.moderate(&request.content).await {
        Ok(Some(scores)) => scores,
        Ok(None) => {
            return Err(ApiFailure::Unavailable(
                "moderation backend exhausted retries".to_string(),
            ));
        }
        Err(error) => {
            tracing::warn!(%error, "scorer failed for single-message request");
            return Err(ApiFailure::Unavailable(format!(
                "moderation backend error: {error}"
            )));
        }
    };

    // Project the full score map down to the requested categories.
    let selected: CategoryScores = request
        .categories
        .iter()
        .map(|category| (*category, scores.get(category).copied().unwrap_or(0.0)))
        .collect();

    Ok(Json(ModerateResponse {
        message_id: request.message_id,
        content: request.content,
        category_scores: selected,
    }))
}
