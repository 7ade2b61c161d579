//! Fixed-window rate limiting keyed by client identity.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::{
    config::RateLimitConfig, metrics::RATE_LIMITED_TOTAL, request_context::RequestContext,
    state::AppState, Error,
};

/// Expired windows are swept once the map grows past this many clients.
const SWEEP_THRESHOLD: usize = 10_000;

/// Identity used for rate limiting: first `x-forwarded-for` hop, then
/// `x-real-ip`, else `unknown`.
pub fn client_key(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    forwarded
        .or_else(real_ip)
        .unwrap_or("unknown")
        .to_string()
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    enabled: bool,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests.max(1),
            window: Duration::from_secs(config.window_seconds.max(1)),
            enabled: config.enabled,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Count one request for `key` at `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if windows.len() > SWEEP_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            let elapsed = now.duration_since(entry.started);
            return Decision::Limited {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }
        entry.count += 1;
        Decision::Allowed {
            remaining: self.max_requests - entry.count,
        }
    }

    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if !state.rate_limiter.enabled() {
        return next.run(req).await;
    }

    let key = req
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.client_key.clone())
        .unwrap_or_else(|| client_key(req.headers()));

    match state.rate_limiter.check(&key) {
        Decision::Allowed { .. } => next.run(req).await,
        Decision::Limited { retry_after } => {
            let path = crate::metrics::sanitize_path(req.uri().path());
            RATE_LIMITED_TOTAL.with_label_values(&[&path]).inc();
            tracing::warn!(client = %key, path = %path, "Rate limit exceeded");
            Error::TooManyRequests {
                retry_after_seconds: retry_after.as_secs().max(1),
            }
            .into_response()
        }
    }
}
