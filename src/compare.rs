//! Comparison of batch-computed results against a live moderation service.
//!
//! The comparator diffs two independently computed score sets for the same
//! message and reports per-category percentage discrepancies.

use std::collections::HashMap;

use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};

use crate::category::Category;
use crate::error::ModerationError;
use crate::types::{ModerateRequest, ModerateResponse, ModerationRecord};

/// Per-category difference between a baseline (file) score and a freshly
/// fetched one. Produced for reporting only, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Discrepancy {
    pub category: Category,
    pub file_score: f64,
    pub api_score: f64,
    pub percentage_discrepancy: f64,
}

/// Index batch records by the canonical form of their message id, so a
/// numeric id in the file matches its textual form from the API.
pub fn index_records(records: Vec<ModerationRecord>) -> HashMap<String, ModerationRecord> {
    records
        .into_iter()
        .map(|record| (record.message_id.canonical(), record))
        .collect()
}

/// Compare a freshly fetched record against the baseline set.
///
/// Returns `None` when the message is absent from the baseline (only
/// messages present in both sets are validated). Otherwise returns one
/// [`Discrepancy`] per baseline category, even when every discrepancy is
/// zero; filtering is the caller's job.
///
/// A baseline score of exactly zero yields a 0.0 discrepancy regardless of
/// the fresh score. This masks true relative discrepancy at zero baselines;
/// the behavior is preserved as specified and flagged for product review.
pub fn compare(
    baseline: &HashMap<String, ModerationRecord>,
    fresh: &ModerationRecord,
) -> Option<Vec<Discrepancy>> {
    let file_record = baseline.get(&fresh.message_id.canonical())?;

    let discrepancies = file_record
        .category_scores
        .iter()
        .map(|(category, file_score)| {
            let api_score = fresh.category_scores.get(category).copied().unwrap_or(0.0);
            let percentage_discrepancy = if *file_score != 0.0 {
                (api_score - file_score).abs() / file_score * 100.0
            } else {
                0.0
            };
            Discrepancy {
                category: *category,
                file_score: *file_score,
                api_score,
                percentage_discrepancy,
            }
        })
        .collect();

    Some(discrepancies)
}

/// Thin client for the moderation service's `/moderate` endpoint.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http_client: reqwest::Client,
    endpoint: String,
    token: SecretString,
}

impl ServiceClient {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token: SecretString::from(token.into()),
        }
    }

    /// Fetch a fresh moderation result for one message.
    pub async fn moderate(
        &self,
        request: &ModerateRequest,
    ) -> Result<ModerateResponse, ModerationError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(self.token.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| ModerationError::Connection(format!("request failed: {e}")))?;

        let status = response.status().as_u16();
        match status {
            200 => response
                .json()
                .await
                .map_err(|e| ModerationError::Parse(format!("cannot decode response: {e}"))),
            401 => Err(ModerationError::Authentication(
                "service rejected the bearer token".to_string(),
            )),
            429 => Err(ModerationError::RateLimited(
                "service unavailable or upstream exhausted".to_string(),
            )),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(ModerationError::api_error(status, body))
            }
        }
    }
}

/// Re-request every baseline message through the live service with bounded
/// concurrency and print a discrepancy report as each response arrives.
/// Per-message fetch failures are logged and skipped.
pub async fn run_comparison(
    baseline: &HashMap<String, ModerationRecord>,
    service: &ServiceClient,
    categories: &[Category],
    concurrency: usize,
) {
    let requests: Vec<ModerateRequest> = baseline
        .values()
        .map(|record| ModerateRequest {
            message_id: record.message_id.clone(),
            content: record.content.clone(),
            categories: categories.to_vec(),
        })
        .collect();

    let mut responses = futures::stream::iter(
        requests
            .into_iter()
            .map(|request| async move { service.moderate(&request).await }),
    )
    .buffer_unordered(concurrency.max(1));

    while let Some(result) = responses.next().await {
        match result {
            Ok(response) => {
                let fresh = ModerationRecord {
                    message_id: response.message_id,
                    content: response.content,
                    category_scores: response.category_scores,
                };
                if let Some(discrepancies) = compare(baseline, &fresh) {
                    print_report(baseline, &fresh, &discrepancies);
                }
            }
            Err(error) => {
                tracing::warn!(%error, "comparison fetch failed, skipping message");
            }
        }
    }
}

fn print_report(
    baseline: &HashMap<String, ModerationRecord>,
    fresh: &ModerationRecord,
    discrepancies: &[Discrepancy],
) {
    println!("Message ID: {}", fresh.message_id);
    if let Some(file_record) = baseline.get(&fresh.message_id.canonical()) {
        println!("File Result: {:?}", file_record.category_scores);
    }
    println!("API Result: {:?}", fresh.category_scores);
    println!("Discrepancies:");
    for discrepancy in discrepancies {
        println!(
            "  Category: {} -> Discrepancy: {:.2}%",
            discrepancy.category, discrepancy.percentage_discrepancy
        );
    }
    println!();
}
