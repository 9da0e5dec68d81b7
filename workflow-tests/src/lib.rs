//! End-to-end workflow test harness.
//!
//! Boots a real listing-service on a random port with Places, Gemini and
//! Stripe replaced by local mock servers and an in-memory subscription
//! store, then hands out a [`BackendClient`] pointed at it.
//!
//! ```bash
//! cargo test -p workflow-tests
//! ```

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use listing_client::{
    BackendClient, CardConfirmer, CardDetails, ClientConfig, ListingApi, ProcessorError,
    ProcessorResult,
};
use listing_service::config::{
    Config, GeminiConfig, PlacesConfig, ReaperConfig, ServerConfig, StripeConfig,
};
use listing_service::services::InMemorySubscriptionStore;
use listing_service::Application;
use secrecy::Secret;
use serde_json::{json, Value};
use std::sync::{Arc, Once};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const GEMINI_MODEL: &str = "gemini-1.5-flash";

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,workflow_tests=debug,listing_client=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn config(places: &MockServer, gemini: &MockServer, stripe: &MockServer) -> Config {
    Config {
        common: service_core::config::Config::default(),
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        redis: None,
        stripe: StripeConfig {
            secret_key: Secret::new("sk_test_workflow".to_string()),
            api_base_url: stripe.uri(),
            currency: "usd".to_string(),
            timeout: Duration::from_secs(5),
        },
        gemini: GeminiConfig {
            api_key: Secret::new("workflow-gemini-key".to_string()),
            model: GEMINI_MODEL.to_string(),
            api_base_url: gemini.uri(),
            timeout: Duration::from_secs(5),
        },
        places: PlacesConfig {
            api_key: Secret::new("workflow-places-key".to_string()),
            api_base_url: places.uri(),
            timeout: Duration::from_secs(5),
        },
        reaper: ReaperConfig {
            enabled: false,
            pending_intent_ttl: Duration::from_secs(3600),
            interval: Duration::from_secs(300),
        },
        rate_limit_per_min: 0,
        service_name: "listing-service-workflow".to_string(),
    }
}

/// A live backend plus its mocked upstreams.
pub struct WorkflowEnv {
    pub base_url: String,
    pub places: MockServer,
    pub gemini: MockServer,
    pub stripe: Arc<MockServer>,
    pub store: Arc<InMemorySubscriptionStore>,
    pub api: Arc<BackendClient>,
}

impl WorkflowEnv {
    pub async fn start() -> Result<Self> {
        init_tracing();

        let places = MockServer::start().await;
        let gemini = MockServer::start().await;
        let stripe = Arc::new(MockServer::start().await);
        let store = Arc::new(InMemorySubscriptionStore::new());

        let app = Application::build_with_store(config(&places, &gemini, &stripe), store.clone())
            .await
            .map_err(|e| anyhow!("Failed to build listing-service: {}", e))?;
        let base_url = format!("http://127.0.0.1:{}", app.port());

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        wait_for_service(&format!("{}/health", base_url), Duration::from_secs(10)).await?;

        let api = Arc::new(BackendClient::new(
            ClientConfig::new(&base_url).with_anon_key("workflow-anon-key"),
        ));

        Ok(Self {
            base_url,
            places,
            gemini,
            stripe,
            store,
            api,
        })
    }

    pub fn api(&self) -> Arc<dyn ListingApi> {
        self.api.clone()
    }

    pub async fn mount_predictions(&self, descriptions: &[&str]) {
        let predictions: Vec<Value> = descriptions
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let (main, secondary) = d.split_once(", ").unwrap_or((*d, ""));
                json!({
                    "description": d,
                    "place_id": format!("place-{i}"),
                    "structured_formatting": {"main_text": main, "secondary_text": secondary}
                })
            })
            .collect();

        Mock::given(method("GET"))
            .and(path("/autocomplete/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "OK", "predictions": predictions})),
            )
            .mount(&self.places)
            .await;
    }

    pub async fn mount_analysis(&self, analysis: &Value) {
        let reply = json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": analysis.to_string()}]}}]
        });
        Mock::given(method("POST"))
            .and(path(format!("/models/{}:generateContent", GEMINI_MODEL)))
            .and(query_param("key", "workflow-gemini-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply))
            .mount(&self.gemini)
            .await;
    }

    /// Stripe accepts the intent creation and answers with `id`.
    pub async fn mount_intent_creation(&self, id: &str, address: &str) {
        Mock::given(method("POST"))
            .and(path("/payment_intents"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(payment_intent(
                    id,
                    "requires_payment_method",
                    address,
                )),
            )
            .mount(&self.stripe)
            .await;
    }

    /// What Stripe reports when the backend re-fetches `id`.
    pub async fn mount_intent_status(&self, id: &str, status: &str, address: &str) {
        mount_status(&self.stripe, id, status, address).await;
    }

    /// A card element whose confirmation leaves the intent in `outcome`.
    pub fn card(&self, outcome: &str, address: &str) -> ProcessorCard {
        ProcessorCard {
            stripe: self.stripe.clone(),
            outcome: outcome.to_string(),
            address: address.to_string(),
        }
    }
}

async fn mount_status(stripe: &MockServer, id: &str, status: &str, address: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/payment_intents/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_intent(id, status, address)))
        .mount(stripe)
        .await;
}

pub fn payment_intent(id: &str, status: &str, address: &str) -> Value {
    json!({
        "id": id,
        "object": "payment_intent",
        "amount": 9900,
        "currency": "usd",
        "client_secret": format!("{id}_secret_workflow"),
        "status": status,
        "metadata": {"address": address, "service": "listing-analytics-premium"},
        "created": 1_700_000_000
    })
}

/// Stands in for the hosted card element: confirming moves the mocked
/// Stripe intent to the configured status, the way Stripe.js would.
pub struct ProcessorCard {
    stripe: Arc<MockServer>,
    outcome: String,
    address: String,
}

#[async_trait]
impl CardConfirmer for ProcessorCard {
    fn is_mounted(&self) -> bool {
        true
    }

    async fn confirm(
        &self,
        client_secret: &str,
        details: &CardDetails,
    ) -> Result<ProcessorResult, ProcessorError> {
        let id = client_secret
            .split("_secret")
            .next()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProcessorError::new("Malformed client secret"))?;

        tracing::debug!(payment_intent_id = id, cardholder = %details.cardholder_name, "Confirming card");
        mount_status(&self.stripe, id, &self.outcome, &self.address).await;

        let message = match self.outcome.as_str() {
            "succeeded" => None,
            "requires_payment_method" => Some("Your card was declined.".to_string()),
            other => Some(format!("Payment is {}", other)),
        };
        Ok(ProcessorResult {
            status: self.outcome.clone(),
            message,
        })
    }
}

/// Listing analysis that satisfies the backend's schema check.
pub fn sample_analysis(address: &str) -> Value {
    json!({
        "listing": {
            "address": address,
            "city": "Springfield",
            "propertyType": "Single Family Home",
            "price": "$425,000",
            "pricePerSqft": "$212/sqft",
            "beds": 3,
            "baths": 2,
            "sqft": "2,004",
            "daysOnMarket": 12
        },
        "overallScore": 78,
        "ratings": [
            {"title": "School District", "score": 85, "maxScore": 100, "category": "Location", "description": "Strong"}
        ],
        "categoryScores": [{"category": "Location", "score": 82}],
        "radarData": [{"subject": "Schools", "A": 85, "fullMark": 100}],
        "insights": {
            "summary": "Well priced for the area.",
            "alerts": [{"type": "warning", "title": "Roof", "message": "Roof is 18 years old"}],
            "topPriorities": ["Inspect roof", "Check HOA", "Compare comps"]
        }
    })
}

/// Polls `url` until it answers 200 OK or `timeout` elapses.
pub async fn wait_for_service(url: &str, timeout: Duration) -> Result<()> {
    let client = reqwest::Client::new();
    let start = std::time::Instant::now();

    loop {
        match client.get(url).timeout(Duration::from_secs(2)).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            Ok(resp) => tracing::debug!("Waiting for {}: status {}", url, resp.status()),
            Err(e) => tracing::debug!("Waiting for {}: {}", url, e),
        }

        if start.elapsed() > timeout {
            return Err(anyhow!("Timeout waiting for {}", url));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
