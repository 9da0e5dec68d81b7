#![allow(dead_code)]

use listing_service::config::{
    Config, GeminiConfig, PlacesConfig, ReaperConfig, ServerConfig, StripeConfig,
};
use listing_service::services::InMemorySubscriptionStore;
use listing_service::startup::Application;
use secrecy::Secret;
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

pub const PLACES_KEY: &str = "test-places-key";
pub const GEMINI_KEY: &str = "test-gemini-key";
pub const STRIPE_KEY: &str = "sk_test_listing";

/// A running listing-service whose upstreams are local mock servers.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub places: MockServer,
    pub gemini: MockServer,
    pub stripe: MockServer,
    pub store: Arc<InMemorySubscriptionStore>,
    pub client: reqwest::Client,
}

pub fn test_config(places: &MockServer, gemini: &MockServer, stripe: &MockServer) -> Config {
    Config {
        common: service_core::config::Config::default(),
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Random port
        },
        redis: None,
        stripe: StripeConfig {
            secret_key: Secret::new(STRIPE_KEY.to_string()),
            api_base_url: stripe.uri(),
            currency: "usd".to_string(),
            timeout: Duration::from_secs(5),
        },
        gemini: GeminiConfig {
            api_key: Secret::new(GEMINI_KEY.to_string()),
            model: "gemini-1.5-flash".to_string(),
            api_base_url: gemini.uri(),
            timeout: Duration::from_secs(5),
        },
        places: PlacesConfig {
            api_key: Secret::new(PLACES_KEY.to_string()),
            api_base_url: places.uri(),
            timeout: Duration::from_secs(5),
        },
        reaper: ReaperConfig {
            enabled: false,
            pending_intent_ttl: Duration::from_secs(3600),
            interval: Duration::from_secs(300),
        },
        rate_limit_per_min: 0,
        service_name: "listing-service-test".to_string(),
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        let places = MockServer::start().await;
        let gemini = MockServer::start().await;
        let stripe = MockServer::start().await;
        let store = Arc::new(InMemorySubscriptionStore::new());

        let config = test_config(&places, &gemini, &stripe);
        let app = Application::build_with_store(config, store.clone())
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            places,
            gemini,
            stripe,
            store,
            client,
        }
    }

    pub async fn post_json(&self, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_raw(&self, path: &str, body: &str) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("Failed to execute request")
    }
}

/// A Stripe PaymentIntent body as the API returns it.
pub fn payment_intent(id: &str, status: &str, address: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "object": "payment_intent",
        "amount": 9900,
        "currency": "usd",
        "client_secret": format!("{id}_secret_test"),
        "status": status,
        "metadata": {"address": address, "service": "listing-analytics-premium"},
        "created": 1_700_000_000
    })
}

/// A Gemini `generateContent` body whose first candidate carries `text`.
pub fn gemini_reply(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}],
        "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 800}
    })
}

pub fn sample_analysis(address: &str) -> serde_json::Value {
    serde_json::json!({
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
