//! Key-value storage for subscription records and unverified intents.
//!
//! Redis in deployment; an in-process map when no Redis URL is configured and
//! in tests. Every operation touches a single key, last write wins.

use crate::models::{PendingIntent, SubscriptionRecord};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use thiserror::Error;

const PENDING_INTENTS_KEY: &str = "pending_intents";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Corrupt stored record: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get_subscription(&self, key: &str) -> Result<Option<SubscriptionRecord>, StoreError>;

    async fn put_subscription(&self, record: &SubscriptionRecord) -> Result<(), StoreError>;

    async fn add_pending(&self, pending: &PendingIntent) -> Result<(), StoreError>;

    async fn remove_pending(&self, payment_intent_id: &str) -> Result<(), StoreError>;

    /// Pending intents created at or before `cutoff`.
    async fn pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<PendingIntent>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Records are JSON strings under their own key; pending intents live in one
/// sorted set scored by creation time.
#[derive(Clone)]
pub struct RedisSubscriptionStore {
    client: redis::Client,
}

impl RedisSubscriptionStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                tracing::error!("Failed to get redis connection: {}", e);
                StoreError::from(e)
            })
    }
}

#[async_trait]
impl SubscriptionStore for RedisSubscriptionStore {
    async fn get_subscription(&self, key: &str) -> Result<Option<SubscriptionRecord>, StoreError> {
        let mut con = self.connection().await?;
        let raw: Option<String> = redis::cmd("GET").arg(key).query_async(&mut con).await?;

        raw.map(|r| serde_json::from_str(&r))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn put_subscription(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        let _: () = redis::cmd("SET")
            .arg(&record.key)
            .arg(serde_json::to_string(record)?)
            .query_async(&mut con)
            .await?;
        Ok(())
    }

    async fn add_pending(&self, pending: &PendingIntent) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        let _: () = redis::cmd("ZADD")
            .arg(PENDING_INTENTS_KEY)
            .arg(pending.created_at.timestamp())
            .arg(&pending.payment_intent_id)
            .query_async(&mut con)
            .await?;
        Ok(())
    }

    async fn remove_pending(&self, payment_intent_id: &str) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        let _: () = redis::cmd("ZREM")
            .arg(PENDING_INTENTS_KEY)
            .arg(payment_intent_id)
            .query_async(&mut con)
            .await?;
        Ok(())
    }

    async fn pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<PendingIntent>, StoreError> {
        let mut con = self.connection().await?;
        let entries: Vec<(String, i64)> = redis::cmd("ZRANGEBYSCORE")
            .arg(PENDING_INTENTS_KEY)
            .arg("-inf")
            .arg(cutoff.timestamp())
            .arg("WITHSCORES")
            .query_async(&mut con)
            .await?;

        Ok(entries
            .into_iter()
            .map(|(payment_intent_id, ts)| PendingIntent {
                payment_intent_id,
                created_at: Utc.timestamp_opt(ts, 0).single().unwrap_or(cutoff),
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut con).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySubscriptionStore {
    subscriptions: DashMap<String, SubscriptionRecord>,
    pending: DashMap<String, DateTime<Utc>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn get_subscription(&self, key: &str) -> Result<Option<SubscriptionRecord>, StoreError> {
        Ok(self.subscriptions.get(key).map(|r| r.value().clone()))
    }

    async fn put_subscription(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        self.subscriptions.insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn add_pending(&self, pending: &PendingIntent) -> Result<(), StoreError> {
        self.pending
            .insert(pending.payment_intent_id.clone(), pending.created_at);
        Ok(())
    }

    async fn remove_pending(&self, payment_intent_id: &str) -> Result<(), StoreError> {
        self.pending.remove(payment_intent_id);
        Ok(())
    }

    async fn pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<PendingIntent>, StoreError> {
        let mut due: Vec<PendingIntent> = self
            .pending
            .iter()
            .filter(|entry| *entry.value() <= cutoff)
            .map(|entry| PendingIntent {
                payment_intent_id: entry.key().clone(),
                created_at: *entry.value(),
            })
            .collect();
        due.sort_by_key(|p| p.created_at);
        Ok(due)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::subscription_key;
    use chrono::Duration;

    fn record(key: &str, intent: &str) -> SubscriptionRecord {
        SubscriptionRecord {
            key: subscription_key(key),
            status: "active".to_string(),
            payment_intent_id: intent.to_string(),
            address: Some(key.to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn records_are_looked_up_by_exact_key() {
        let store = InMemorySubscriptionStore::new();
        store.put_subscription(&record("123 Main St", "pi_1")).await.unwrap();

        assert!(store
            .get_subscription("subscription:123 Main St")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .get_subscription("subscription:123 main st")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn rewriting_a_record_is_last_write_wins() {
        let store = InMemorySubscriptionStore::new();
        store.put_subscription(&record("a", "pi_1")).await.unwrap();
        store.put_subscription(&record("a", "pi_2")).await.unwrap();

        let stored = store.get_subscription("subscription:a").await.unwrap().unwrap();
        assert_eq!(stored.payment_intent_id, "pi_2");
    }

    #[tokio::test]
    async fn pending_before_returns_only_expired_entries_oldest_first() {
        let store = InMemorySubscriptionStore::new();
        let now = Utc::now();
        for (id, age_mins) in [("pi_new", 1), ("pi_old", 120), ("pi_older", 240)] {
            store
                .add_pending(&PendingIntent {
                    payment_intent_id: id.to_string(),
                    created_at: now - Duration::minutes(age_mins),
                })
                .await
                .unwrap();
        }

        let due = store.pending_before(now - Duration::hours(1)).await.unwrap();
        let ids: Vec<_> = due.iter().map(|p| p.payment_intent_id.as_str()).collect();
        assert_eq!(ids, vec!["pi_older", "pi_old"]);

        store.remove_pending("pi_old").await.unwrap();
        assert_eq!(store.pending_count(), 2);
    }
}
