use axum::{extract::State, Json};
use service_core::error::AppError;
use service_core::utils::ValidatedJson;

use crate::{dtos::AnalyzeListingRequest, services::metrics, AppState};

/// Runs the model over a listing address.
///
/// The body is the model's JSON exactly as parsed; on any failure the caller
/// only ever sees `{"error": ...}`.
pub async fn analyze_listing(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<AnalyzeListingRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let address = payload.address.unwrap_or_default();
    tracing::info!(address = %address, "Analyzing listing");

    let result = state.analyzer.analyze(&address).await;
    metrics::record_analysis(result.is_ok());

    Ok(Json(result?))
}
