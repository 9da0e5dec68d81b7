use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

/// Rate limiter keyed by client IP address
pub type IpRateLimiter = Arc<RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>>;

/// Create an IP-keyed limiter allowing `attempts` requests per `window_seconds`.
///
/// Returns `None` when `attempts` is zero, which disables limiting.
pub fn create_ip_rate_limiter(attempts: u32, window_seconds: u64) -> Option<IpRateLimiter> {
    let burst = NonZeroU32::new(attempts)?;
    // Replenish interval per cell; never zero, or `with_period` yields no quota.
    let window_nanos = window_seconds.max(1).saturating_mul(1_000_000_000);
    let period = Duration::from_nanos((window_nanos / attempts as u64).max(1));
    let quota = Quota::with_period(period)?.allow_burst(burst);

    Some(Arc::new(RateLimiter::dashmap(quota)))
}

/// Resolve the caller's IP: first hop of `x-forwarded-for`, then the socket peer.
fn client_ip(request: &Request) -> Option<IpAddr> {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok());

    forwarded.or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}

/// Middleware for IP-based rate limiting
pub async fn ip_rate_limit_middleware(
    State(limiter): State<IpRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(ip) = client_ip(&request) else {
        tracing::warn!("Could not determine IP for rate limiting");
        return Ok(next.run(request).await);
    };

    match limiter.check_key(&ip) {
        Ok(_) => Ok(next.run(request).await),
        Err(negative) => {
            let wait_time = negative.wait_time_from(DefaultClock::default().now());
            tracing::warn!(%ip, "Rate limit exceeded");
            Err(AppError::TooManyRequests(
                "Too many requests from this IP. Please try again later.".to_string(),
                Some(wait_time.as_secs().max(1)),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::StatusCode, middleware::from_fn_with_state, routing::get};
    use tower::ServiceExt;

    fn app(limiter: IpRateLimiter) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(limiter, ip_rate_limit_middleware))
    }

    fn request_from(ip: &str) -> Request {
        Request::builder()
            .uri("/")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn zero_attempts_disables_limiting() {
        assert!(create_ip_rate_limiter(0, 60).is_none());
    }

    #[tokio::test]
    async fn high_limits_still_build_a_limiter() {
        let limiter = create_ip_rate_limiter(1_000_000, 60).unwrap();
        let app = app(limiter);
        let res = app.oneshot(request_from("10.0.0.3")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        assert!(create_ip_rate_limiter(u32::MAX, 1).is_some());
    }

    #[tokio::test]
    async fn limits_are_tracked_per_ip() {
        let limiter = create_ip_rate_limiter(2, 60).unwrap();
        let app = app(limiter);

        for _ in 0..2 {
            let res = app.clone().oneshot(request_from("10.0.0.1")).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }

        let res = app.clone().oneshot(request_from("10.0.0.1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

        let res = app.oneshot(request_from("10.0.0.2")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn requests_without_an_ip_pass_through() {
        let limiter = create_ip_rate_limiter(1, 60).unwrap();
        let app = app(limiter);

        for _ in 0..3 {
            let req = Request::builder().uri("/").body(Body::empty()).unwrap();
            let res = app.clone().oneshot(req).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
    }
}
