use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::discount::DiscountPolicy;
use crate::enrichment::EnrichmentOrchestrator;
use crate::errors::AppError;
use crate::models::EnrichmentRecord;
use crate::report::ReportColumns;

/// Maximum lessee names accepted in one request.
pub const MAX_BATCH_SIZE: usize = 1_000;

/// Shared application state.
pub struct AppState {
    /// Orchestrator owning the process-wide fact cache.
    pub orchestrator: EnrichmentOrchestrator,
    /// Policy applied when a request carries none.
    pub default_policy: DiscountPolicy,
}

#[derive(Debug, Deserialize)]
pub struct EnrichRequest {
    pub lessees: Vec<String>,
    /// Overrides the configured policy for this batch only.
    pub policy: Option<DiscountPolicy>,
}

#[derive(Debug, Serialize)]
pub struct EnrichedLessee {
    pub record: EnrichmentRecord,
    pub report: ReportColumns,
}

#[derive(Debug, Serialize)]
pub struct EnrichResponse {
    pub run_id: Uuid,
    pub records: Vec<EnrichedLessee>,
}

/// Routes served by the API, without the outer middleware stack.
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/enrich", post(enrich_lessees))
        .with_state(state)
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "lease-credit-enrichment",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/v1/enrich
///
/// Enriches a batch of lessee names with risk tiers and discount rates.
/// Records come back in request order. A lessee whose lookup failed still
/// gets a record, tagged High risk with a warning.
///
/// # Returns
///
/// * `Result<Json<EnrichResponse>, AppError>` - The enriched batch, or 400/422 for
///   an empty batch or an unusable policy.
pub async fn enrich_lessees(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EnrichRequest>,
) -> Result<Json<EnrichResponse>, AppError> {
    tracing::info!("POST /api/v1/enrich - {} lessees", request.lessees.len());

    if request.lessees.is_empty() {
        return Err(AppError::BadRequest(
            "At least one lessee name required".to_string(),
        ));
    }
    if request.lessees.len() > MAX_BATCH_SIZE {
        return Err(AppError::BadRequest(format!(
            "At most {} lessee names per request",
            MAX_BATCH_SIZE
        )));
    }

    let policy = request.policy.as_ref().unwrap_or(&state.default_policy);
    let batch = state
        .orchestrator
        .enrich_batch(&request.lessees, policy)
        .await?;

    let records = batch
        .records
        .into_iter()
        .map(|record| EnrichedLessee {
            report: ReportColumns::from(&record),
            record,
        })
        .collect();

    Ok(Json(EnrichResponse {
        run_id: batch.run_id,
        records,
    }))
}
