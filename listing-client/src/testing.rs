//! Scriptable in-process [`ListingApi`] for unit tests.

use crate::api::{AddressPrediction, CreatedIntent, ListingApi, SubscriptionStatus, Verification};
use crate::error::ApiError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Scripted<T> = Mutex<VecDeque<(Duration, Result<T, ApiError>)>>;

#[derive(Default)]
pub(crate) struct FakeApi {
    pub autocomplete_inputs: Mutex<Vec<String>>,
    autocomplete_replies: Scripted<Vec<AddressPrediction>>,
    analysis_replies: Scripted<Value>,
    intent_replies: Scripted<CreatedIntent>,
    verify_replies: Scripted<Verification>,
    pub subscribed: AtomicBool,
    pub analyze_calls: AtomicUsize,
    pub intent_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
    pub intent_addresses: Mutex<Vec<Option<String>>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply_autocomplete(&self, delay: Duration, reply: Result<Vec<AddressPrediction>, ApiError>) {
        push(&self.autocomplete_replies, delay, reply);
    }

    pub fn reply_analysis(&self, delay: Duration, reply: Result<Value, ApiError>) {
        push(&self.analysis_replies, delay, reply);
    }

    pub fn reply_intent(&self, reply: Result<CreatedIntent, ApiError>) {
        push(&self.intent_replies, Duration::ZERO, reply);
    }

    pub fn reply_verify(&self, reply: Result<Verification, ApiError>) {
        push(&self.verify_replies, Duration::ZERO, reply);
    }

    pub fn autocomplete_count(&self) -> usize {
        self.autocomplete_inputs.lock().unwrap().len()
    }
}

fn push<T>(queue: &Scripted<T>, delay: Duration, reply: Result<T, ApiError>) {
    queue.lock().unwrap().push_back((delay, reply));
}

async fn next<T>(queue: &Scripted<T>, fallback: impl FnOnce() -> T) -> Result<T, ApiError> {
    let scripted = queue.lock().unwrap().pop_front();
    match scripted {
        Some((delay, reply)) => {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            reply
        }
        None => Ok(fallback()),
    }
}

pub(crate) fn backend_error(message: &str) -> ApiError {
    ApiError::Backend {
        status: 500,
        message: message.to_string(),
    }
}

pub(crate) fn prediction(description: &str) -> AddressPrediction {
    AddressPrediction {
        description: description.to_string(),
        place_id: format!("place-{}", description.len()),
        main_text: description.to_string(),
        secondary_text: String::new(),
    }
}

#[async_trait]
impl ListingApi for FakeApi {
    async fn autocomplete(&self, input: &str) -> Result<Vec<AddressPrediction>, ApiError> {
        self.autocomplete_inputs.lock().unwrap().push(input.to_string());
        next(&self.autocomplete_replies, Vec::new).await
    }

    async fn place_details(&self, place_id: &str) -> Result<Value, ApiError> {
        Ok(json!({"place_id": place_id}))
    }

    async fn analyze_listing(&self, address: &str) -> Result<Value, ApiError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.analysis_replies, || json!({"address": address})).await
    }

    async fn create_payment_intent(
        &self,
        _amount: f64,
        address: Option<&str>,
    ) -> Result<CreatedIntent, ApiError> {
        let n = self.intent_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.intent_addresses
            .lock()
            .unwrap()
            .push(address.map(str::to_string));
        next(&self.intent_replies, || CreatedIntent {
            client_secret: format!("pi_{n}_secret_x"),
            payment_intent_id: format!("pi_{n}"),
        })
        .await
    }

    async fn verify_payment(&self, _payment_intent_id: &str) -> Result<Verification, ApiError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.verify_replies, || Verification {
            success: true,
            status: "succeeded".to_string(),
        })
        .await
    }

    async fn check_subscription(&self, _address: &str) -> Result<SubscriptionStatus, ApiError> {
        let subscribed = self.subscribed.load(Ordering::SeqCst);
        Ok(SubscriptionStatus {
            has_subscription: subscribed,
            subscription: subscribed.then(|| json!({"status": "active"})),
        })
    }
}
