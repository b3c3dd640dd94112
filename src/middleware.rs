//! Per-client rate limiting
//!
//! Fixed-window counter keyed by the client address. Requests over the limit
//! are answered with 429 before reaching any route.

use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;

/// Buckets kept before expired windows are swept
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    started: Instant,
}

/// Outcome of counting one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Seconds until the current window ends
    pub reset_secs: u64,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_requests: u64,
    window: Duration,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: Duration::from_millis(config.window_ms),
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count a request from `key` at `now`
    pub fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        if windows.len() > SWEEP_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            started: now,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                count: 0,
                started: now,
            };
        }

        let allowed = entry.count < self.max_requests;
        if allowed {
            entry.count += 1;
        }

        let elapsed = now.duration_since(entry.started);
        Decision {
            allowed,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(entry.count),
            reset_secs: self.window.saturating_sub(elapsed).as_secs(),
        }
    }

    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }
}

fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

fn set_rate_headers(response: &mut Response, decision: &Decision) {
    let headers = response.headers_mut();
    for (name, value) in [
        ("ratelimit-limit", decision.limit),
        ("ratelimit-remaining", decision.remaining),
        ("ratelimit-reset", decision.reset_secs),
    ] {
        headers.insert(HeaderName::from_static(name), HeaderValue::from(value));
    }
}

pub async fn rate_limit_middleware(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    let decision = state.limiter.check(&key);

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        warn!("Rate limit exceeded for {}", key);
        AppError::TooManyRequests.into_response()
    };

    set_rate_headers(&mut response, &decision);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u64, window_ms: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            max_requests,
            window_ms,
        })
    }

    #[test]
    fn test_blocks_after_limit() {
        let limiter = limiter(2, 60_000);
        let now = Instant::now();
        assert!(limiter.check_at("10.0.0.1", now).allowed);
        let second = limiter.check_at("10.0.0.1", now);
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);
        assert!(!limiter.check_at("10.0.0.1", now).allowed);

        // other clients have their own window
        assert!(limiter.check_at("10.0.0.2", now).allowed);
    }

    #[test]
    fn test_window_resets() {
        let limiter = limiter(1, 1_000);
        let start = Instant::now();
        assert!(limiter.check_at("k", start).allowed);
        assert!(!limiter.check_at("k", start + Duration::from_millis(500)).allowed);

        let later = limiter.check_at("k", start + Duration::from_millis(1_000));
        assert!(later.allowed);
        assert_eq!(later.reset_secs, 1);
    }
}
