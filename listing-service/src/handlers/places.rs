use axum::{extract::State, Json};
use service_core::error::AppError;
use service_core::utils::ValidatedJson;

use crate::{
    dtos::{AutocompleteRequest, AutocompleteResponse, PlaceDetailsRequest, PlaceDetailsResponse},
    services::metrics,
    AppState,
};

/// Address predictions for a partial input, relayed as Google returns them.
pub async fn autocomplete(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<AutocompleteRequest>,
) -> Result<Json<AutocompleteResponse>, AppError> {
    let input = payload.input.unwrap_or_default();

    let result = state.places.autocomplete(&input).await;
    metrics::record_places("autocomplete", result.is_ok());

    Ok(Json(AutocompleteResponse {
        predictions: result?,
    }))
}

pub async fn details(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<PlaceDetailsRequest>,
) -> Result<Json<PlaceDetailsResponse>, AppError> {
    let place_id = payload.place_id.unwrap_or_default();

    let result = state.places.details(&place_id).await;
    metrics::record_places("details", result.is_ok());

    Ok(Json(PlaceDetailsResponse { result: result? }))
}
