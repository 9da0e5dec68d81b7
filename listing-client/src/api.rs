//! Typed calls to the listing backend.

use crate::{config::ClientConfig, error::ApiError};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

/// One autocomplete suggestion, flattened from Google's wire form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "WirePrediction")]
pub struct AddressPrediction {
    pub description: String,
    pub place_id: String,
    pub main_text: String,
    pub secondary_text: String,
}

#[derive(Deserialize)]
struct WirePrediction {
    description: String,
    place_id: String,
    #[serde(default)]
    structured_formatting: Option<StructuredFormatting>,
}

#[derive(Deserialize, Default)]
struct StructuredFormatting {
    #[serde(default)]
    main_text: String,
    #[serde(default)]
    secondary_text: String,
}

impl From<WirePrediction> for AddressPrediction {
    fn from(wire: WirePrediction) -> Self {
        let formatting = wire.structured_formatting.unwrap_or_default();
        Self {
            main_text: if formatting.main_text.is_empty() {
                wire.description.clone()
            } else {
                formatting.main_text
            },
            secondary_text: formatting.secondary_text,
            description: wire.description,
            place_id: wire.place_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedIntent {
    pub client_secret: String,
    pub payment_intent_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Verification {
    pub success: bool,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatus {
    pub has_subscription: bool,
    pub subscription: Option<Value>,
}

#[derive(Deserialize)]
struct Predictions {
    #[serde(default)]
    predictions: Vec<AddressPrediction>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[async_trait]
pub trait ListingApi: Send + Sync {
    async fn autocomplete(&self, input: &str) -> Result<Vec<AddressPrediction>, ApiError>;

    async fn place_details(&self, place_id: &str) -> Result<Value, ApiError>;

    async fn analyze_listing(&self, address: &str) -> Result<Value, ApiError>;

    async fn create_payment_intent(
        &self,
        amount: f64,
        address: Option<&str>,
    ) -> Result<CreatedIntent, ApiError>;

    async fn verify_payment(&self, payment_intent_id: &str) -> Result<Verification, ApiError>;

    async fn check_subscription(&self, address: &str) -> Result<SubscriptionStatus, ApiError>;
}

/// [`ListingApi`] over HTTP.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    config: ClientConfig,
}

impl BackendClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        route: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.config.endpoint(route);
        let mut request = self
            .client
            .post(&url)
            .timeout(self.config.request_timeout)
            .json(body);
        if let Some(key) = &self.config.anon_key {
            request = request
                .bearer_auth(key.expose_secret())
                .header("apikey", key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("Failed to send POST request to {}: {}", url, e);
            ApiError::from(e)
        })?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&bytes)
                .map(|b| b.error)
                .unwrap_or_else(|_| format!("Request failed with status {}", status.as_u16()));
            tracing::warn!(route, status = status.as_u16(), error = %message, "Backend error");
            return Err(ApiError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ListingApi for BackendClient {
    async fn autocomplete(&self, input: &str) -> Result<Vec<AddressPrediction>, ApiError> {
        let body: Predictions = self
            .post("places-autocomplete", &json!({ "input": input }))
            .await?;
        Ok(body.predictions)
    }

    async fn place_details(&self, place_id: &str) -> Result<Value, ApiError> {
        let body: Value = self
            .post("places-details", &json!({ "placeId": place_id }))
            .await?;
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn analyze_listing(&self, address: &str) -> Result<Value, ApiError> {
        self.post("analyze-listing", &json!({ "address": address }))
            .await
    }

    async fn create_payment_intent(
        &self,
        amount: f64,
        address: Option<&str>,
    ) -> Result<CreatedIntent, ApiError> {
        self.post(
            "create-payment-intent",
            &json!({ "amount": amount, "address": address }),
        )
        .await
    }

    async fn verify_payment(&self, payment_intent_id: &str) -> Result<Verification, ApiError> {
        self.post(
            "verify-payment",
            &json!({ "paymentIntentId": payment_intent_id }),
        )
        .await
    }

    async fn check_subscription(&self, address: &str) -> Result<SubscriptionStatus, ApiError> {
        self.post("check-subscription", &json!({ "address": address }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> BackendClient {
        BackendClient::new(ClientConfig::new(server.uri()).with_anon_key("anon-key"))
    }

    #[test]
    fn predictions_flatten_structured_formatting() {
        let prediction: AddressPrediction = serde_json::from_value(json!({
            "description": "123 Main St, Springfield, IL, USA",
            "place_id": "p1",
            "structured_formatting": {"main_text": "123 Main St", "secondary_text": "Springfield, IL, USA"},
            "types": ["street_address"]
        }))
        .unwrap();

        assert_eq!(prediction.place_id, "p1");
        assert_eq!(prediction.main_text, "123 Main St");
        assert_eq!(prediction.secondary_text, "Springfield, IL, USA");
    }

    #[test]
    fn predictions_without_formatting_fall_back_to_description() {
        let prediction: AddressPrediction =
            serde_json::from_value(json!({"description": "1 Elm St", "place_id": "p2"})).unwrap();
        assert_eq!(prediction.main_text, "1 Elm St");
        assert_eq!(prediction.secondary_text, "");
    }

    #[tokio::test]
    async fn requests_carry_anon_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/check-subscription"))
            .and(header("authorization", "Bearer anon-key"))
            .and(header("apikey", "anon-key"))
            .and(body_json(json!({"address": "1 Main St"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"hasSubscription": false, "subscription": null})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let status = backend(&server).check_subscription("1 Main St").await.unwrap();
        assert!(!status.has_subscription);
        assert!(status.subscription.is_none());
    }

    #[tokio::test]
    async fn backend_errors_keep_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/create-payment-intent"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({"error": "Payment processor not configured"})),
            )
            .mount(&server)
            .await;

        let err = backend(&server)
            .create_payment_intent(99.0, Some("1 Main St"))
            .await
            .unwrap_err();

        match &err {
            ApiError::Backend { status, message } => {
                assert_eq!(*status, 500);
                assert_eq!(message, "Payment processor not configured");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.message(), "Payment processor not configured");
    }

    #[tokio::test]
    async fn non_json_errors_fall_back_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let err = backend(&server).analyze_listing("1 Main St").await.unwrap_err();
        assert_eq!(err.to_string(), "Request failed with status 502");
    }
}
