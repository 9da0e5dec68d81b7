//! Premium unlock payment flow.
//!
//! ```text
//! Idle -> CollectingDetails -> IntentRequested -> IntentCreated
//!      -> ConfirmingWithProcessor -> VerifyingWithBackend -> Succeeded | Failed
//! ```
//!
//! Steps run strictly in sequence. Closing the dialog bumps an epoch so a
//! step that completes afterwards changes nothing.

use crate::{
    api::ListingApi,
    error::ApiError,
    notify::{Notice, Notifier},
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::watch;

pub const PAYMENT_SUCCEEDED: &str = "Payment successful!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentState {
    Idle,
    CollectingDetails,
    IntentRequested,
    IntentCreated { payment_intent_id: String },
    ConfirmingWithProcessor { payment_intent_id: String },
    VerifyingWithBackend { payment_intent_id: String },
    Succeeded { payment_intent_id: String },
    Failed { message: String },
}

impl PaymentState {
    /// Whether the dialog's submit control should be disabled.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PaymentState::IntentRequested
                | PaymentState::IntentCreated { .. }
                | PaymentState::ConfirmingWithProcessor { .. }
                | PaymentState::VerifyingWithBackend { .. }
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardDetails {
    pub cardholder_name: String,
}

impl CardDetails {
    pub fn new(cardholder_name: impl Into<String>) -> Self {
        Self {
            cardholder_name: cardholder_name.into(),
        }
    }
}

/// Outcome reported by the payment processor after confirming a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorResult {
    pub status: String,
    pub message: Option<String>,
}

impl ProcessorResult {
    pub fn succeeded() -> Self {
        Self {
            status: "succeeded".to_string(),
            message: None,
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProcessorError {
    pub message: String,
}

impl ProcessorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The hosted card element. Raw card data never passes through this crate;
/// `confirm` may suspend while the processor runs a 3-D Secure challenge.
#[async_trait]
pub trait CardConfirmer: Send + Sync {
    fn is_mounted(&self) -> bool;

    async fn confirm(
        &self,
        client_secret: &str,
        details: &CardDetails,
    ) -> Result<ProcessorResult, ProcessorError>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaymentError {
    #[error("Please enter the cardholder name")]
    MissingCardholderName,

    #[error("Card details are not ready yet")]
    CardNotReady,

    #[error("Cannot {action} while {state:?}")]
    InvalidState {
        action: &'static str,
        state: PaymentState,
    },

    #[error("Payment dialog was closed")]
    Closed,

    #[error("{0}")]
    Failed(String),
}

type SuccessCallback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Inner {
    details: CardDetails,
    epoch: u64,
}

pub struct PaymentFlow {
    api: Arc<dyn ListingApi>,
    confirmer: Arc<dyn CardConfirmer>,
    notifier: Arc<dyn Notifier>,
    amount: f64,
    address: Option<String>,
    state: watch::Sender<PaymentState>,
    inner: Mutex<Inner>,
    on_success: Mutex<Option<SuccessCallback>>,
}

impl PaymentFlow {
    pub fn new(
        api: Arc<dyn ListingApi>,
        confirmer: Arc<dyn CardConfirmer>,
        notifier: Arc<dyn Notifier>,
        amount: f64,
        address: Option<String>,
    ) -> Self {
        let (state, _) = watch::channel(PaymentState::Idle);
        Self {
            api,
            confirmer,
            notifier,
            amount,
            address: address.filter(|a| !a.trim().is_empty()),
            state,
            inner: Mutex::new(Inner::default()),
            on_success: Mutex::new(None),
        }
    }

    /// Runs once, on the first transition to `Succeeded`.
    pub fn on_success(self, callback: impl FnOnce() + Send + 'static) -> Self {
        *self
            .on_success
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Box::new(callback));
        self
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> PaymentState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PaymentState> {
        self.state.subscribe()
    }

    /// Details entered so far; kept across failures and retries.
    pub fn details(&self) -> CardDetails {
        self.inner().details.clone()
    }

    pub fn open(&self) {
        self.state.send_if_modified(|state| {
            if *state == PaymentState::Idle {
                *state = PaymentState::CollectingDetails;
                true
            } else {
                false
            }
        });
    }

    /// Back to the form after a failure. The next submit requests a new intent.
    pub fn retry(&self) -> Result<(), PaymentError> {
        let _inner = self.inner();
        let current = self.state();
        if !matches!(current, PaymentState::Failed { .. }) {
            return Err(PaymentError::InvalidState {
                action: "retry",
                state: current,
            });
        }
        self.state.send_replace(PaymentState::CollectingDetails);
        Ok(())
    }

    /// Closes the dialog. Any step still running is abandoned; the created
    /// intent, if any, is left for the backend to clean up.
    pub fn close(&self) {
        let mut inner = self.inner();
        inner.epoch += 1;
        inner.details = CardDetails::default();
        self.state.send_replace(PaymentState::Idle);
    }

    /// Applies `next` unless the dialog was closed since `epoch`.
    fn advance(&self, epoch: u64, next: PaymentState) -> Result<(), PaymentError> {
        let inner = self.inner();
        if inner.epoch != epoch {
            return Err(PaymentError::Closed);
        }
        self.state.send_replace(next);
        Ok(())
    }

    fn fail(&self, epoch: u64, message: String) -> PaymentError {
        if let Err(closed) = self.advance(
            epoch,
            PaymentState::Failed {
                message: message.clone(),
            },
        ) {
            return closed;
        }
        tracing::warn!(error = %message, "Payment failed");
        self.notifier.notify(Notice::Error(message.clone()));
        PaymentError::Failed(message)
    }

    pub async fn submit(&self, details: CardDetails) -> Result<(), PaymentError> {
        let epoch = {
            let mut inner = self.inner();
            let current = self.state.borrow().clone();
            if current != PaymentState::CollectingDetails {
                return Err(PaymentError::InvalidState {
                    action: "submit",
                    state: current,
                });
            }
            inner.details = details.clone();
            if details.cardholder_name.trim().is_empty() {
                return Err(PaymentError::MissingCardholderName);
            }
            if !self.confirmer.is_mounted() {
                return Err(PaymentError::CardNotReady);
            }
            // Leave CollectingDetails before releasing the lock so a second
            // submit sees IntentRequested.
            self.state.send_replace(PaymentState::IntentRequested);
            inner.epoch
        };

        let intent = match self
            .api
            .create_payment_intent(self.amount, self.address.as_deref())
            .await
        {
            Ok(intent) => intent,
            Err(e) => {
                let message = match e {
                    ApiError::Backend { message, .. } => message,
                    _ => "Failed to create payment intent".to_string(),
                };
                return Err(self.fail(epoch, message));
            }
        };
        let payment_intent_id = intent.payment_intent_id.clone();
        tracing::info!(payment_intent_id = %payment_intent_id, "Payment intent created");

        self.advance(
            epoch,
            PaymentState::IntentCreated {
                payment_intent_id: payment_intent_id.clone(),
            },
        )?;
        self.advance(
            epoch,
            PaymentState::ConfirmingWithProcessor {
                payment_intent_id: payment_intent_id.clone(),
            },
        )?;

        match self.confirmer.confirm(&intent.client_secret, &details).await {
            Ok(result) if result.status == "succeeded" => {}
            Ok(result) => {
                let message = result.message.unwrap_or_else(|| {
                    format!("Payment was not completed (status: {})", result.status)
                });
                return Err(self.fail(epoch, message));
            }
            Err(e) => return Err(self.fail(epoch, e.message)),
        }

        self.advance(
            epoch,
            PaymentState::VerifyingWithBackend {
                payment_intent_id: payment_intent_id.clone(),
            },
        )?;

        match self.api.verify_payment(&payment_intent_id).await {
            Ok(verification) if verification.success => {}
            Ok(verification) => {
                tracing::warn!(
                    payment_intent_id = %payment_intent_id,
                    status = %verification.status,
                    "Backend did not confirm payment"
                );
                return Err(self.fail(epoch, "Payment was not successful".to_string()));
            }
            Err(e) => {
                tracing::error!(payment_intent_id = %payment_intent_id, error = %e, "Verification failed");
                return Err(self.fail(epoch, "Failed to verify payment".to_string()));
            }
        }

        self.advance(
            epoch,
            PaymentState::Succeeded {
                payment_intent_id: payment_intent_id.clone(),
            },
        )?;
        tracing::info!(payment_intent_id = %payment_intent_id, "Payment verified");
        self.notifier
            .notify(Notice::Success(PAYMENT_SUCCEEDED.to_string()));

        let callback = self
            .on_success
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(callback) = callback {
            callback();
        }
        Ok(())
    }
}
