//! Stripe PaymentIntents client.
//!
//! Only the three calls the premium purchase needs: create, retrieve and
//! cancel. Requests are form-encoded and authenticated with the secret key.

use crate::config::StripeConfig;
use crate::models::{PaymentIntent, NO_ADDRESS, PREMIUM_SERVICE_TAG};
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("Payment processor not configured")]
    NotConfigured,

    #[error("Invalid payment intent id")]
    InvalidId,

    #[error("{message}")]
    Api {
        status: u16,
        kind: String,
        code: Option<String>,
        message: String,
    },

    #[error("Payment processor request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected payment processor response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Stripe ids are `pi_` followed by alphanumerics; anything else would be
/// spliced into a URL path.
pub fn is_valid_intent_id(id: &str) -> bool {
    id.strip_prefix("pi_")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric()))
}

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    config: StripeConfig,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .basic_auth(self.config.secret_key.expose_secret(), None::<&str>)
            .timeout(self.config.timeout)
    }

    /// Create an intent for `amount` minor units, tagged with the listing
    /// address (or `N/A`) so the subscription can be keyed later.
    pub async fn create_payment_intent(
        &self,
        amount: i64,
        address: Option<&str>,
    ) -> Result<PaymentIntent, StripeError> {
        if !self.is_configured() {
            return Err(StripeError::NotConfigured);
        }

        let address = address
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(NO_ADDRESS);
        let amount = amount.to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", self.config.currency.as_str()),
            ("metadata[address]", address),
            ("metadata[service]", PREMIUM_SERVICE_TAG),
            ("automatic_payment_methods[enabled]", "true"),
        ];

        let url = format!("{}/payment_intents", self.config.api_base_url);
        let response = self
            .authorized(self.client.post(&url))
            .form(&form)
            .send()
            .await?;

        let intent = Self::parse(response, "create_payment_intent").await?;
        tracing::info!(
            payment_intent_id = %intent.id,
            amount = intent.amount,
            currency = %intent.currency,
            "Payment intent created"
        );
        Ok(intent)
    }

    pub async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, StripeError> {
        if !self.is_configured() {
            return Err(StripeError::NotConfigured);
        }
        if !is_valid_intent_id(id) {
            return Err(StripeError::InvalidId);
        }

        let url = format!("{}/payment_intents/{}", self.config.api_base_url, id);
        let response = self.authorized(self.client.get(&url)).send().await?;

        Self::parse(response, "retrieve_payment_intent").await
    }

    pub async fn cancel_payment_intent(&self, id: &str) -> Result<PaymentIntent, StripeError> {
        if !self.is_configured() {
            return Err(StripeError::NotConfigured);
        }
        if !is_valid_intent_id(id) {
            return Err(StripeError::InvalidId);
        }

        let url = format!("{}/payment_intents/{}/cancel", self.config.api_base_url, id);
        let response = self
            .authorized(self.client.post(&url))
            .form(&[("cancellation_reason", "abandoned")])
            .send()
            .await?;

        let intent = Self::parse(response, "cancel_payment_intent").await?;
        tracing::info!(payment_intent_id = %intent.id, "Payment intent cancelled");
        Ok(intent)
    }

    async fn parse(response: reqwest::Response, op: &str) -> Result<PaymentIntent, StripeError> {
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, op, "Stripe response");

        if status.is_success() {
            return Ok(serde_json::from_str(&body)?);
        }

        let detail = serde_json::from_str::<StripeErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| StripeErrorDetail {
                kind: "api_error".to_string(),
                code: None,
                message: None,
            });

        tracing::error!(
            status = %status,
            kind = %detail.kind,
            code = ?detail.code,
            op,
            "Stripe request failed"
        );

        Err(StripeError::Api {
            status: status.as_u16(),
            kind: detail.kind,
            code: detail.code,
            message: detail
                .message
                .unwrap_or_else(|| format!("Payment processor returned {}", status)),
        })
    }
}
