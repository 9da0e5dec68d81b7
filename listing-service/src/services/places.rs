//! Google Places client for address autocomplete and place details.

use crate::config::PlacesConfig;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlacesError {
    #[error("Places API key not configured")]
    NotConfigured,

    /// Places answered, but with a status we do not relay.
    #[error("Places API error: {0}")]
    Status(String),

    #[error("Places request failed: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct AutocompleteResponse {
    status: String,
    #[serde(default)]
    predictions: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct PlacesClient {
    client: Client,
    config: PlacesConfig,
}

impl PlacesClient {
    pub fn new(config: PlacesConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.config.api_key.expose_secret().is_empty()
    }

    /// US street-address predictions for a partial input.
    ///
    /// `ZERO_RESULTS` is a normal answer and yields an empty list.
    pub async fn autocomplete(&self, input: &str) -> Result<Vec<serde_json::Value>, PlacesError> {
        if !self.is_configured() {
            return Err(PlacesError::NotConfigured);
        }

        let url = format!("{}/autocomplete/json", self.config.api_base_url);
        let response: AutocompleteResponse = self
            .client
            .get(&url)
            .query(&[
                ("input", input),
                ("types", "address"),
                ("components", "country:us"),
                ("key", self.config.api_key.expose_secret().as_str()),
            ])
            .timeout(self.config.timeout)
            .send()
            .await?
            .json()
            .await?;

        match response.status.as_str() {
            "OK" | "ZERO_RESULTS" => {
                tracing::debug!(
                    count = response.predictions.len(),
                    "Places autocomplete answered"
                );
                Ok(response.predictions)
            }
            other => {
                tracing::warn!(status = %other, "Places autocomplete rejected");
                Err(PlacesError::Status(other.to_string()))
            }
        }
    }

    /// Structured address and geometry for a place id.
    pub async fn details(&self, place_id: &str) -> Result<serde_json::Value, PlacesError> {
        if !self.is_configured() {
            return Err(PlacesError::NotConfigured);
        }

        let url = format!("{}/details/json", self.config.api_base_url);
        let response: DetailsResponse = self
            .client
            .get(&url)
            .query(&[
                ("place_id", place_id),
                ("fields", "formatted_address,address_components,geometry"),
                ("key", self.config.api_key.expose_secret().as_str()),
            ])
            .timeout(self.config.timeout)
            .send()
            .await?
            .json()
            .await?;

        if response.status != "OK" {
            tracing::warn!(status = %response.status, place_id, "Places details rejected");
            return Err(PlacesError::Status(response.status));
        }

        Ok(response.result.unwrap_or(serde_json::Value::Null))
    }
}
