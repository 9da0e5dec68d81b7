use crate::models::SubscriptionRecord;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct AutocompleteRequest {
    #[validate(
        required(message = "input is required"),
        length(min = 1, message = "input is required")
    )]
    pub input: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AutocompleteResponse {
    pub predictions: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlaceDetailsRequest {
    #[validate(
        required(message = "placeId is required"),
        length(min = 1, message = "placeId is required")
    )]
    pub place_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlaceDetailsResponse {
    pub result: serde_json::Value,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AnalyzeListingRequest {
    #[validate(
        required(message = "address is required"),
        length(min = 1, message = "address is required")
    )]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentIntentRequest {
    /// Major currency units, e.g. `99` or `99.5`.
    #[validate(
        required(message = "amount is required"),
        range(exclusive_min = 0.0, message = "amount must be greater than zero")
    )]
    pub amount: Option<f64>,
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    #[validate(
        required(message = "paymentIntentId is required"),
        length(min = 1, message = "paymentIntentId is required")
    )]
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub status: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckSubscriptionRequest {
    #[validate(
        required(message = "address is required"),
        length(min = 1, message = "address is required")
    )]
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSubscriptionResponse {
    pub has_subscription: bool,
    pub subscription: Option<SubscriptionRecord>,
}

/// Converts a major-unit amount to the processor's minor units.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}
