//! Listing analysis: prompt construction, model call, and checking the reply
//! before it is relayed to the browser.

use super::providers::{GenerationParams, ProviderError, TextProvider};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Gemini API key not configured")]
    NotConfigured,

    #[error("Failed to get AI response")]
    Upstream(#[source] ProviderError),

    #[error("No response from AI")]
    EmptyResponse,

    #[error("Failed to parse AI response")]
    Unparseable,

    #[error("AI response violated the analysis contract: {0}")]
    Contract(String),
}

pub fn build_prompt(address: &str) -> String {
    format!(
        r#"You are a real estate listing analysis AI. Analyze this property address and return JSON with exactly this structure:

{{
  "listing": {{
    "address": "{address}",
    "city": "City Name",
    "propertyType": "Single Family Home",
    "price": "$XXX,XXX",
    "pricePerSqft": "$XXX/sqft",
    "beds": X,
    "baths": X,
    "sqft": "X,XXX",
    "daysOnMarket": XX
  }},
  "overallScore": XX,
  "ratings": [
    {{
      "title": "Factor Name",
      "score": XX,
      "maxScore": 100,
      "category": "Category",
      "description": "Description of the factor"
    }}
  ],
  "categoryScores": [
    {{"category": "Category Name", "score": XX}}
  ],
  "radarData": [
    {{"subject": "Area", "A": XX, "fullMark": 100}}
  ],
  "insights": {{
    "summary": "Overall summary",
    "alerts": [
      {{"type": "warning", "title": "Alert Title", "message": "Alert message"}}
    ],
    "topPriorities": ["Priority 1", "Priority 2", "Priority 3"]
  }}
}}

Provide realistic data for the address: {address}"#
    )
}

/// Strips markdown fences the model sometimes wraps around JSON and parses
/// what is left.
pub fn extract_json(raw: &str) -> Result<Value, AnalysisError> {
    let cleaned = raw.trim().replace("```json\n", "").replace("```json", "").replace("```", "");
    serde_json::from_str(&cleaned).map_err(|e| {
        tracing::warn!(error = %e, raw_len = raw.len(), "Model reply is not valid JSON");
        AnalysisError::Unparseable
    })
}

/// Minimal shape the results page depends on.
pub fn check_contract(value: &Value) -> Result<(), AnalysisError> {
    let violation = |reason: &str| Err(AnalysisError::Contract(reason.to_string()));

    let Some(root) = value.as_object() else {
        return violation("expected a JSON object");
    };

    match root.get("listing").and_then(Value::as_object) {
        None => return violation("listing must be an object"),
        Some(listing) if !listing.get("address").is_some_and(Value::is_string) => {
            return violation("listing.address must be a string");
        }
        Some(_) => {}
    }

    if !root.get("overallScore").is_some_and(Value::is_number) {
        return violation("overallScore must be a number");
    }
    if !root.get("ratings").is_some_and(Value::is_array) {
        return violation("ratings must be an array");
    }
    if !root.get("insights").is_some_and(Value::is_object) {
        return violation("insights must be an object");
    }

    Ok(())
}

#[derive(Clone)]
pub struct ListingAnalyzer {
    provider: Arc<dyn TextProvider>,
}

impl ListingAnalyzer {
    pub fn new(provider: Arc<dyn TextProvider>) -> Self {
        Self { provider }
    }

    fn params() -> GenerationParams {
        GenerationParams {
            temperature: Some(0.7),
            max_tokens: Some(4096),
            response_mime_type: Some("application/json".to_string()),
        }
    }

    /// Returns the model's parsed reply unchanged once it passes the contract.
    pub async fn analyze(&self, address: &str) -> Result<Value, AnalysisError> {
        let response = self
            .provider
            .generate(&build_prompt(address), &Self::params())
            .await
            .map_err(|e| match e {
                ProviderError::NotConfigured(_) => AnalysisError::NotConfigured,
                other => {
                    tracing::error!(error = %other, "Gemini request failed");
                    AnalysisError::Upstream(other)
                }
            })?;

        let text = response.text.ok_or(AnalysisError::EmptyResponse)?;
        let analysis = extract_json(&text)?;
        check_contract(&analysis)?;

        tracing::info!(
            address,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Listing analyzed"
        );

        Ok(analysis)
    }
}
