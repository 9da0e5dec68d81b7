use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata value used when an intent was created without an address.
pub const NO_ADDRESS: &str = "N/A";

/// Product tag attached to every intent this service creates.
pub const PREMIUM_SERVICE_TAG: &str = "listing-analytics-premium";

/// Lifecycle status of a Stripe PaymentIntent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
    Failed,
    #[serde(other)]
    Unknown,
}

impl PaymentIntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresAction => "requires_action",
            Self::Processing => "processing",
            Self::RequiresCapture => "requires_capture",
            Self::Succeeded => "succeeded",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PaymentIntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subset of a Stripe PaymentIntent this service reads.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentIntentStatus,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub created: i64,
}

impl PaymentIntent {
    /// The listing address carried in metadata, if a real one was supplied.
    pub fn address(&self) -> Option<&str> {
        self.metadata
            .get("address")
            .map(String::as_str)
            .filter(|a| !a.is_empty() && *a != NO_ADDRESS)
    }
}

/// Proof of a verified premium purchase.
///
/// Written once, after the intent was re-fetched and seen as `succeeded`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    pub key: String,
    pub status: String,
    pub payment_intent_id: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    pub fn active(key: String, intent: &PaymentIntent, created_at: DateTime<Utc>) -> Self {
        Self {
            key,
            status: "active".to_string(),
            payment_intent_id: intent.id.clone(),
            address: intent.address().map(str::to_string),
            created_at,
        }
    }
}

/// An intent that was created but has not been verified yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingIntent {
    pub payment_intent_id: String,
    pub created_at: DateTime<Utc>,
}

pub fn subscription_key(suffix: &str) -> String {
    format!("subscription:{}", suffix)
}
