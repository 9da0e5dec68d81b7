use secrecy::Secret;
use std::time::Duration;

/// Premium unlock price in USD.
pub const DEFAULT_PRICE: f64 = 99.0;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Backend root, e.g. `https://<project>.supabase.co/functions/v1/make-server-52cdd920`.
    pub base_url: String,
    /// Public anon key, sent as bearer token and `apikey` header.
    pub anon_key: Option<Secret<String>>,
    pub request_timeout: Duration,
    pub price: f64,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: None,
            request_timeout: Duration::from_secs(30),
            price: DEFAULT_PRICE,
        }
    }

    pub fn with_anon_key(mut self, key: impl Into<String>) -> Self {
        self.anon_key = Some(Secret::new(key.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    pub(crate) fn endpoint(&self, route: &str) -> String {
        format!("{}/{}", self.base_url, route.trim_start_matches('/'))
    }
}
