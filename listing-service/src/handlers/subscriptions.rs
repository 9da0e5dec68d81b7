use axum::{extract::State, Json};
use service_core::error::AppError;
use service_core::utils::ValidatedJson;

use crate::{
    dtos::{CheckSubscriptionRequest, CheckSubscriptionResponse},
    models::subscription_key,
    AppState,
};

/// Looks the address up verbatim; no case or whitespace folding.
pub async fn check_subscription(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CheckSubscriptionRequest>,
) -> Result<Json<CheckSubscriptionResponse>, AppError> {
    let address = payload.address.unwrap_or_default();
    let subscription = state
        .store
        .get_subscription(&subscription_key(&address))
        .await?;

    tracing::debug!(address = %address, found = subscription.is_some(), "Subscription lookup");

    Ok(Json(CheckSubscriptionResponse {
        has_subscription: subscription.is_some(),
        subscription,
    }))
}
