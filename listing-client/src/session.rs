//! Session state shared by the widgets: current view, whether an analysis has
//! completed, and the premium gate.

use crate::{api::ListingApi, error::ApiError};
use serde_json::Value;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum View {
    #[default]
    Home,
    AddressInput,
    Dashboard {
        address: String,
        analysis: Value,
    },
    MarketingPlan,
}

/// Opens once per session after a verified payment or an existing subscription.
#[derive(Debug, Clone, Default)]
pub struct PremiumGate(Arc<AtomicBool>);

impl PremiumGate {
    pub fn open(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct SessionState {
    view: View,
    has_analyzed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
    gate: PremiumGate,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn view(&self) -> View {
        self.lock().view.clone()
    }

    pub fn navigate(&self, view: View) {
        self.lock().view = view;
    }

    /// Moves to the dashboard and marks the session as having analyzed.
    pub fn show_results(&self, address: String, analysis: Value) {
        let mut state = self.lock();
        state.view = View::Dashboard { address, analysis };
        state.has_analyzed = true;
    }

    pub fn has_analyzed(&self) -> bool {
        self.lock().has_analyzed
    }

    pub fn premium_gate(&self) -> PremiumGate {
        self.gate.clone()
    }

    /// The marketing plan is premium content. Returns false and stays put
    /// while the gate is closed.
    pub fn open_marketing_plan(&self) -> bool {
        if !self.gate.is_open() {
            return false;
        }
        self.navigate(View::MarketingPlan);
        true
    }

    /// Opens the gate when the backend already holds a subscription for
    /// `address`. Never closes it.
    pub async fn refresh_subscription(
        &self,
        api: &dyn ListingApi,
        address: &str,
    ) -> Result<bool, ApiError> {
        let status = api.check_subscription(address).await?;
        if status.has_subscription {
            tracing::info!(address, "Existing subscription found");
            self.gate.open();
        }
        Ok(self.gate.is_open())
    }
}
