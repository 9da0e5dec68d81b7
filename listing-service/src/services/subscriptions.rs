use super::subscription_store::{StoreError, SubscriptionStore};
use crate::models::{subscription_key, PaymentIntent, PaymentIntentStatus, SubscriptionRecord};
use chrono::Utc;

/// Persist the subscription for an intent already confirmed as `succeeded`,
/// then drop it from the pending set.
///
/// The record is written under the listing address (when the intent carries
/// one) and under the intent id. Both writes are idempotent.
pub async fn record_subscriptions(
    store: &dyn SubscriptionStore,
    intent: &PaymentIntent,
) -> Result<Vec<SubscriptionRecord>, StoreError> {
    debug_assert_eq!(intent.status, PaymentIntentStatus::Succeeded);

    let created_at = Utc::now();
    let mut keys = Vec::with_capacity(2);
    if let Some(address) = intent.address() {
        keys.push(subscription_key(address));
    }
    keys.push(subscription_key(&intent.id));

    let mut records = Vec::with_capacity(keys.len());
    for key in keys {
        let record = SubscriptionRecord::active(key, intent, created_at);
        store.put_subscription(&record).await?;
        records.push(record);
    }

    store.remove_pending(&intent.id).await?;

    tracing::info!(
        payment_intent_id = %intent.id,
        address = intent.address().unwrap_or("-"),
        "Subscription recorded"
    );

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PendingIntent;
    use crate::services::subscription_store::InMemorySubscriptionStore;

    fn succeeded(address: &str) -> PaymentIntent {
        serde_json::from_value(serde_json::json!({
            "id": "pi_42",
            "amount": 9900,
            "currency": "usd",
            "status": "succeeded",
            "metadata": {"address": address, "service": "listing-analytics-premium"}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn writes_address_and_intent_keys_and_clears_pending() {
        let store = InMemorySubscriptionStore::new();
        store
            .add_pending(&PendingIntent {
                payment_intent_id: "pi_42".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let records = record_subscriptions(&store, &succeeded("123 Main St"))
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert!(store
            .get_subscription("subscription:123 Main St")
            .await
            .unwrap()
            .is_some());
        let by_intent = store.get_subscription("subscription:pi_42").await.unwrap().unwrap();
        assert_eq!(by_intent.address.as_deref(), Some("123 Main St"));
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test]
    async fn placeholder_address_only_writes_intent_key() {
        let store = InMemorySubscriptionStore::new();
        let records = record_subscriptions(&store, &succeeded("N/A")).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "subscription:pi_42");
        assert!(store.get_subscription("subscription:N/A").await.unwrap().is_none());
    }
}
