//! Application startup and lifecycle management.

use crate::config::Config;
use crate::handlers;
use crate::services::{
    providers::GeminiTextProvider, InMemorySubscriptionStore, IntentReaper, ListingAnalyzer,
    PlacesClient, RedisSubscriptionStore, StripeClient, SubscriptionStore,
};
use axum::{
    http::{header, HeaderName, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Path prefix of the deployed edge function; existing web clients call
/// `{base}/make-server-52cdd920/<route>`.
pub const FUNCTION_PREFIX: &str = "/make-server-52cdd920";

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub places: PlacesClient,
    pub analyzer: ListingAnalyzer,
    pub stripe: StripeClient,
    pub store: Arc<dyn SubscriptionStore>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn SubscriptionStore>) -> Self {
        let places = PlacesClient::new(config.places.clone());
        if !places.is_configured() {
            tracing::warn!("Places API key not configured - address lookup disabled");
        }

        let gemini = GeminiTextProvider::new(config.gemini.clone());
        if !gemini.is_configured() {
            tracing::warn!("Gemini API key not configured - listing analysis disabled");
        }

        let stripe = StripeClient::new(config.stripe.clone());
        if stripe.is_configured() {
            tracing::info!("Stripe client initialized");
        } else {
            tracing::warn!("Stripe credentials not configured - payment features disabled");
        }

        Self {
            config,
            places,
            analyzer: ListingAnalyzer::new(Arc::new(gemini)),
            stripe,
            store,
        }
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
}

pub fn build_router(state: AppState) -> Router {
    let mut api = Router::new()
        .route("/places-autocomplete", post(handlers::places::autocomplete))
        .route("/places-details", post(handlers::places::details))
        .route("/analyze-listing", post(handlers::analysis::analyze_listing))
        .route(
            "/create-payment-intent",
            post(handlers::payments::create_payment_intent),
        )
        .route("/verify-payment", post(handlers::payments::verify_payment))
        .route(
            "/check-subscription",
            post(handlers::subscriptions::check_subscription),
        );

    // Each of these calls a metered upstream.
    if let Some(limiter) = create_ip_rate_limiter(state.config.rate_limit_per_min, 60) {
        api = api.route_layer(from_fn_with_state(limiter, ip_rate_limit_middleware));
    }

    let routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .merge(api);

    Router::new()
        .merge(routes.clone())
        .nest(FUNCTION_PREFIX, routes)
        .fallback(handlers::not_found)
        .layer(cors_layer())
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build with the store the configuration asks for: Redis when a URL is
    /// set, otherwise an in-process map.
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let store: Arc<dyn SubscriptionStore> = match &config.redis {
            Some(redis_config) => {
                let client = redis::Client::open(redis_config.url.expose_secret().as_str())
                    .map_err(|e| {
                        tracing::error!("Failed to connect to Redis: {}", e);
                        AppError::from(e)
                    })?;
                Arc::new(RedisSubscriptionStore::new(client))
            }
            None => {
                tracing::warn!(
                    "LISTING_REDIS_URL not set - subscriptions are kept in memory and lost on restart"
                );
                Arc::new(InMemorySubscriptionStore::new())
            }
        };

        Self::build_with_store(config, store).await
    }

    pub async fn build_with_store(
        config: Config,
        store: Arc<dyn SubscriptionStore>,
    ) -> Result<Self, AppError> {
        let state = AppState::new(config.clone(), store);

        // Port 0 binds a random port for tests.
        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listing service: HTTP on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Serve until SIGINT/SIGTERM. The intent reaper runs alongside and is
    /// stopped with the server.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let reaper = if self.state.config.reaper.enabled {
            IntentReaper::new(
                self.state.stripe.clone(),
                self.state.store.clone(),
                &self.state.config.reaper,
            )
            .spawn()
        } else {
            None
        };

        let router = build_router(self.state);
        let result = axum::serve(
            self.listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        if let Some(handle) = reaper {
            handle.abort();
        }

        result.map_err(|e| {
            tracing::error!("HTTP server error: {}", e);
            e
        })
    }
}
