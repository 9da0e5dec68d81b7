use crate::{
    api::ListingApi,
    error::ApiError,
    notify::{Notice, Notifier},
    session::Session,
};
use serde_json::Value;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use thiserror::Error;

pub const ANALYSIS_FAILED: &str = "Failed to analyze listing. Please try again.";

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Address is required")]
    EmptyAddress,

    #[error("An analysis is already in progress")]
    InFlight,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Clears the in-flight flag however `submit` exits.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ListingAnalysisClient {
    api: Arc<dyn ListingApi>,
    notifier: Arc<dyn Notifier>,
    session: Session,
    in_flight: AtomicBool,
}

impl ListingAnalysisClient {
    pub fn new(api: Arc<dyn ListingApi>, notifier: Arc<dyn Notifier>, session: Session) -> Self {
        Self {
            api,
            notifier,
            session,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether the submit control should be disabled.
    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Runs one analysis. On success the session moves to the dashboard; on
    /// failure one notice is raised and nothing is retried.
    pub async fn submit(&self, address: &str) -> Result<Value, SubmitError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(SubmitError::EmptyAddress);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SubmitError::InFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        match self.api.analyze_listing(address).await {
            Ok(analysis) => {
                tracing::info!(address, "Listing analyzed");
                self.session
                    .show_results(address.to_string(), analysis.clone());
                Ok(analysis)
            }
            Err(e) => {
                tracing::error!(address, error = %e, "Listing analysis failed");
                self.notifier
                    .notify(Notice::Error(ANALYSIS_FAILED.to_string()));
                Err(e.into())
            }
        }
    }
}
