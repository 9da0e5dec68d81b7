//! Background cleanup of payment intents that were created but never verified.
//!
//! A browser that closes the payment dialog never tells the backend. Each tick
//! re-fetches intents older than the TTL and either records the subscription
//! (paid but unverified), leaves them (still processing), or cancels them.

use super::stripe::{StripeClient, StripeError};
use super::subscription_store::{StoreError, SubscriptionStore};
use super::subscriptions::record_subscriptions;
use crate::config::ReaperConfig;
use crate::models::{PaymentIntentStatus, PendingIntent};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub recorded: usize,
    pub cancelled: usize,
    pub dropped: usize,
    pub kept: usize,
    pub failed: usize,
}

enum Outcome {
    Recorded,
    Cancelled,
    Dropped,
    Kept,
}

pub struct IntentReaper {
    stripe: StripeClient,
    store: Arc<dyn SubscriptionStore>,
    ttl: Duration,
    interval: Duration,
}

impl IntentReaper {
    pub fn new(stripe: StripeClient, store: Arc<dyn SubscriptionStore>, config: &ReaperConfig) -> Self {
        Self {
            stripe,
            store,
            ttl: config.pending_intent_ttl,
            // `time::interval` panics on a zero period.
            interval: config.interval.max(MIN_INTERVAL),
        }
    }

    /// Start the periodic sweep. Returns `None` when there is no processor to
    /// talk to.
    pub fn spawn(self) -> Option<JoinHandle<()>> {
        if !self.stripe.is_configured() {
            tracing::warn!("Payment processor not configured - intent reaper disabled");
            return None;
        }

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            ttl_secs = self.ttl.as_secs(),
            "Intent reaper started"
        );

        Some(tokio::spawn(async move {
            let mut ticker = time::interval(self.interval);
            // The first tick completes immediately; skip it so a fresh process
            // does not sweep before serving traffic.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match self.sweep(Utc::now()).await {
                    Ok(report) if report.examined > 0 => {
                        tracing::info!(?report, "Intent reaper sweep finished")
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!(error = %err, "Intent reaper sweep failed"),
                }
            }
        }))
    }

    /// Process every pending intent created before `now - ttl`.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, StoreError> {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::hours(1));
        let due = self.store.pending_before(now - ttl).await?;

        let mut report = SweepReport {
            examined: due.len(),
            ..Default::default()
        };

        for pending in due {
            match self.reap(&pending).await {
                Ok(Outcome::Recorded) => report.recorded += 1,
                Ok(Outcome::Cancelled) => report.cancelled += 1,
                Ok(Outcome::Dropped) => report.dropped += 1,
                Ok(Outcome::Kept) => report.kept += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(
                        payment_intent_id = %pending.payment_intent_id,
                        error = %err,
                        "Could not reap pending intent; retrying next sweep"
                    );
                }
            }
        }

        Ok(report)
    }

    async fn reap(&self, pending: &PendingIntent) -> Result<Outcome, ReapError> {
        let id = pending.payment_intent_id.as_str();
        let intent = match self.stripe.retrieve_payment_intent(id).await {
            Ok(intent) => intent,
            Err(StripeError::InvalidId) | Err(StripeError::Api { status: 404, .. }) => {
                self.store.remove_pending(id).await?;
                return Ok(Outcome::Dropped);
            }
            Err(err) => return Err(err.into()),
        };

        match intent.status {
            PaymentIntentStatus::Succeeded => {
                record_subscriptions(self.store.as_ref(), &intent).await?;
                Ok(Outcome::Recorded)
            }
            PaymentIntentStatus::Processing => Ok(Outcome::Kept),
            PaymentIntentStatus::Canceled => {
                self.store.remove_pending(id).await?;
                Ok(Outcome::Dropped)
            }
            status => {
                tracing::info!(payment_intent_id = %id, %status, "Cancelling abandoned intent");
                self.stripe.cancel_payment_intent(id).await?;
                self.store.remove_pending(id).await?;
                Ok(Outcome::Cancelled)
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ReapError {
    #[error(transparent)]
    Stripe(#[from] StripeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
