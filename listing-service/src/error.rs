//! Mapping from upstream client errors to HTTP responses.

use crate::services::{AnalysisError, PlacesError, StoreError, StripeError};
use anyhow::anyhow;
use service_core::error::AppError;

impl From<PlacesError> for AppError {
    fn from(err: PlacesError) -> Self {
        match err {
            PlacesError::NotConfigured => AppError::ConfigError(anyhow!(err.to_string())),
            PlacesError::Status(_) => AppError::UpstreamError(err.to_string()),
            PlacesError::Network(e) => {
                tracing::error!(error = %e, "Places request failed");
                AppError::UpstreamError("Failed to reach Places API".to_string())
            }
        }
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::NotConfigured => AppError::ConfigError(anyhow!(err.to_string())),
            AnalysisError::Upstream(_) | AnalysisError::EmptyResponse => {
                AppError::UpstreamError(err.to_string())
            }
            AnalysisError::Unparseable | AnalysisError::Contract(_) => {
                AppError::UpstreamContract(err.to_string())
            }
        }
    }
}

impl From<StripeError> for AppError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::NotConfigured => AppError::ConfigError(anyhow!(err.to_string())),
            StripeError::InvalidId => AppError::BadRequest(anyhow!("paymentIntentId is invalid")),
            StripeError::Api { .. } => AppError::UpstreamError(err.to_string()),
            StripeError::Network(e) => {
                tracing::error!(error = %e, "Stripe request failed");
                AppError::UpstreamError("Failed to reach payment processor".to_string())
            }
            StripeError::Decode(e) => {
                tracing::error!(error = %e, "Stripe response did not decode");
                AppError::UpstreamError("Unexpected payment processor response".to_string())
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Redis(e) => AppError::RedisError(e),
            StoreError::Serialization(e) => AppError::InternalError(e.into()),
        }
    }
}
