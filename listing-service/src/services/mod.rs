pub mod analysis;
pub mod metrics;
pub mod places;
pub mod providers;
pub mod reaper;
pub mod stripe;
pub mod subscription_store;
pub mod subscriptions;

pub use analysis::{AnalysisError, ListingAnalyzer};
pub use metrics::{get_metrics, init_metrics};
pub use places::{PlacesClient, PlacesError};
pub use reaper::IntentReaper;
pub use stripe::{StripeClient, StripeError};
pub use subscription_store::{
    InMemorySubscriptionStore, RedisSubscriptionStore, StoreError, SubscriptionStore,
};
