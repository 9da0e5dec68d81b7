//! Premium purchase: intent creation and server-side verification.

use axum::{extract::State, Json};
use chrono::Utc;
use service_core::error::AppError;
use service_core::utils::ValidatedJson;

use crate::{
    dtos::{
        to_minor_units, CreatePaymentIntentRequest, CreatePaymentIntentResponse,
        VerifyPaymentRequest, VerifyPaymentResponse,
    },
    models::{PaymentIntentStatus, PendingIntent},
    services::{metrics, subscriptions::record_subscriptions},
    AppState,
};

pub async fn create_payment_intent(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreatePaymentIntentRequest>,
) -> Result<Json<CreatePaymentIntentResponse>, AppError> {
    let amount = to_minor_units(payload.amount.unwrap_or_default());
    // Stored verbatim: check-subscription looks the address up as given.
    let address = payload
        .address
        .as_deref()
        .filter(|a| !a.trim().is_empty());

    tracing::info!(amount, address = address.unwrap_or("-"), "Creating payment intent");

    let result = state.stripe.create_payment_intent(amount, address).await;
    metrics::record_payment_intent(result.is_ok());
    let intent = result?;

    let client_secret = intent.client_secret.clone().ok_or_else(|| {
        AppError::UpstreamError("Payment processor returned no client secret".to_string())
    })?;

    // Cleanup bookkeeping only; the purchase itself does not depend on it.
    if let Err(e) = state
        .store
        .add_pending(&PendingIntent {
            payment_intent_id: intent.id.clone(),
            created_at: Utc::now(),
        })
        .await
    {
        tracing::warn!(payment_intent_id = %intent.id, error = %e, "Failed to record pending intent");
    }

    Ok(Json(CreatePaymentIntentResponse {
        client_secret,
        payment_intent_id: intent.id,
    }))
}

/// Re-fetches the intent from Stripe; the browser's word is never trusted.
///
/// `success` is reported only after the subscription records are stored.
pub async fn verify_payment(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, AppError> {
    let id = payload.payment_intent_id.unwrap_or_default();

    let intent = state.stripe.retrieve_payment_intent(&id).await?;
    metrics::record_verification(intent.status.as_str());

    let success = intent.status == PaymentIntentStatus::Succeeded;
    if success {
        record_subscriptions(state.store.as_ref(), &intent).await?;
    }

    tracing::info!(
        payment_intent_id = %intent.id,
        status = %intent.status,
        success,
        "Payment verified"
    );

    Ok(Json(VerifyPaymentResponse {
        success,
        status: intent.status.as_str().to_string(),
    }))
}
