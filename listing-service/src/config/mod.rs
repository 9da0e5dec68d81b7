use anyhow::Result;
use dotenvy::dotenv;
use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use std::env;
use std::time::Duration;

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_PLACES_API_BASE: &str = "https://maps.googleapis.com/maps/api/place";

#[derive(Clone, Debug)]
pub struct Config {
    pub common: core_config::Config,
    pub server: ServerConfig,
    pub redis: Option<RedisConfig>,
    pub stripe: StripeConfig,
    pub gemini: GeminiConfig,
    pub places: PlacesConfig,
    pub reaper: ReaperConfig,
    pub rate_limit_per_min: u32,
    pub service_name: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub url: Secret<String>,
}

#[derive(Clone, Debug)]
pub struct StripeConfig {
    pub secret_key: Secret<String>,
    pub api_base_url: String,
    pub currency: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: Secret<String>,
    pub model: String,
    pub api_base_url: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct PlacesConfig {
    pub api_key: Secret<String>,
    pub api_base_url: String,
    pub timeout: Duration,
}

/// Cleanup of payment intents that were created but never confirmed.
#[derive(Clone, Debug)]
pub struct ReaperConfig {
    pub enabled: bool,
    pub pending_intent_ttl: Duration,
    pub interval: Duration,
}

impl StripeConfig {
    pub fn is_configured(&self) -> bool {
        !self.secret_key.expose_secret().is_empty()
    }
}

/// First non-empty value among `keys`. Later keys are legacy fallbacks.
fn env_any(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.trim().is_empty())
}

fn env_secs(key: &str, default: u64) -> Result<Duration> {
    let secs = match env::var(key) {
        Ok(raw) => raw.parse()?,
        Err(_) => default,
    };
    Ok(Duration::from_secs(secs))
}

/// Like [`env_secs`], but zero is a configuration error.
fn env_nonzero_secs(key: &str, default: u64) -> Result<Duration> {
    nonzero(key, env_secs(key, default)?)
}

fn nonzero(key: &str, value: Duration) -> Result<Duration> {
    if value.is_zero() {
        anyhow::bail!("{} must be greater than zero", key);
    }
    Ok(value)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let common = core_config::Config::load()?;

        let host = env::var("LISTING_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("LISTING_SERVICE_PORT")
            .unwrap_or_else(|_| "3010".to_string())
            .parse()?;

        let redis = env_any(&["LISTING_REDIS_URL"]).map(|url| RedisConfig {
            url: Secret::new(url),
        });

        let stripe = StripeConfig {
            secret_key: Secret::new(
                env_any(&["STRIPE_SECRET_KEY", "VITE_STRIPE_SECRET_KEY"]).unwrap_or_default(),
            ),
            api_base_url: env_any(&["STRIPE_API_BASE_URL"])
                .unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string()),
            currency: env_any(&["STRIPE_CURRENCY"]).unwrap_or_else(|| "usd".to_string()),
            timeout: env_secs("STRIPE_TIMEOUT_SECS", 30)?,
        };

        let gemini = GeminiConfig {
            api_key: Secret::new(
                env_any(&["GEMINI_API_KEY", "VITE_GEMINI_API_KEY"]).unwrap_or_default(),
            ),
            model: env_any(&["GEMINI_MODEL"]).unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            api_base_url: env_any(&["GEMINI_API_BASE_URL"])
                .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string()),
            timeout: env_secs("GEMINI_TIMEOUT_SECS", 30)?,
        };

        let places = PlacesConfig {
            api_key: Secret::new(
                env_any(&["GOOGLE_PLACES_API_KEY", "VITE_GOOGLE_PLACES_API_KEY"])
                    .unwrap_or_default(),
            ),
            api_base_url: env_any(&["GOOGLE_PLACES_API_BASE_URL"])
                .unwrap_or_else(|| DEFAULT_PLACES_API_BASE.to_string()),
            timeout: env_secs("GOOGLE_PLACES_TIMEOUT_SECS", 10)?,
        };

        let reaper = ReaperConfig {
            enabled: env::var("LISTING_REAPER_ENABLED")
                .map(|v| v != "false")
                .unwrap_or(true),
            pending_intent_ttl: env_nonzero_secs("LISTING_PENDING_INTENT_TTL_SECS", 3600)?,
            interval: env_nonzero_secs("LISTING_REAPER_INTERVAL_SECS", 300)?,
        };

        let rate_limit_per_min = env::var("LISTING_RATE_LIMIT_PER_MIN")
            .unwrap_or_else(|_| "120".to_string())
            .parse()?;

        Ok(Self {
            common,
            server: ServerConfig { host, port },
            redis,
            stripe,
            gemini,
            places,
            reaper,
            rate_limit_per_min,
            service_name: "listing-service".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_reaper_durations_are_rejected() {
        let err = nonzero("LISTING_REAPER_INTERVAL_SECS", Duration::ZERO).unwrap_err();
        assert_eq!(
            err.to_string(),
            "LISTING_REAPER_INTERVAL_SECS must be greater than zero"
        );
        assert_eq!(
            nonzero("LISTING_PENDING_INTENT_TTL_SECS", Duration::from_secs(1)).unwrap(),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn zero_interval_from_env_fails_config() {
        let key = "LISTING_TEST_ZERO_INTERVAL_SECS";
        env::set_var(key, "0");
        assert!(env_nonzero_secs(key, 300).is_err());
        env::set_var(key, "45");
        assert_eq!(env_nonzero_secs(key, 300).unwrap(), Duration::from_secs(45));
        env::remove_var(key);
        assert_eq!(env_nonzero_secs(key, 300).unwrap(), Duration::from_secs(300));
    }
}
