use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::app::AppState;
use crate::config::ApiConfig;
use crate::error::ApiError;

// Stale windows are swept once the table grows past this many clients.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

/// Fixed-window request counter keyed by client address.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self { max_requests, window, windows: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn from_config(api: &ApiConfig) -> Self {
        Self::new(api.rate_limit_requests, Duration::from_secs(api.rate_limit_window_secs))
    }

    /// Count one request for `key`; false once the window's budget is spent.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if windows.len() > SWEEP_THRESHOLD {
            let span = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < span);
        }

        let window = windows.entry(key.to_string()).or_insert(Window { count: 0, started: now });
        if now.duration_since(window.started) >= self.window {
            *window = Window { count: 0, started: now };
        }

        if window.count >= self.max_requests {
            false
        } else {
            window.count += 1;
            true
        }
    }
}

/// Applied to every route when `api.enable_rate_limiting` is set.
pub async fn rate_limit_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.config.api.enable_rate_limiting {
        return next.run(request).await;
    }

    let key = client_key(&request, state.config.api.trust_forwarded_for);
    if !state.limiter.check(&key) {
        tracing::warn!(client = %key, "rate limit exceeded");
        return ApiError::too_many_requests("Too many requests, please try again later").into_response();
    }

    next.run(request).await
}

/// Peer address. The first `X-Forwarded-For` hop is used instead only when
/// `trust_forwarded_for` is set, since clients can write that header freely.
fn client_key(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn budget_resets_with_the_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.check_at("10.0.0.1", start));
        assert!(limiter.check_at("10.0.0.1", start));
        assert!(!limiter.check_at("10.0.0.1", start + Duration::from_secs(1)));
        assert!(limiter.check_at("10.0.0.2", start + Duration::from_secs(1)));
        assert!(limiter.check_at("10.0.0.1", start + Duration::from_secs(61)));
    }

    fn from_peer(forwarded_for: &str) -> Request {
        let mut request = Request::builder()
            .header("x-forwarded-for", forwarded_for)
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 7], 40_000))));
        request
    }

    #[test]
    fn peer_address_is_the_default_key() {
        let request = from_peer("203.0.113.9, 10.0.0.1");
        assert_eq!(client_key(&request, false), "198.51.100.7");

        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&request, false), "unknown");
    }

    #[test]
    fn forwarded_header_is_used_behind_a_trusted_proxy() {
        let request = from_peer("203.0.113.9, 10.0.0.1");
        assert_eq!(client_key(&request, true), "203.0.113.9");

        let request = from_peer(" ");
        assert_eq!(client_key(&request, true), "198.51.100.7");
    }
}
