//! Fixed-window request limiter keyed by client address.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::Response;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the current window ends.
    pub reset_after: u64,
}

impl RateDecision {
    /// Attach X-RateLimit-* headers. Reset is a Unix timestamp.
    pub fn apply(&self, res: &mut Response) {
        let reset_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
            + self.reset_after;
        let headers = res.headers_mut();
        headers.insert(HeaderName::from_static(LIMIT_HEADER), HeaderValue::from(self.limit));
        headers.insert(HeaderName::from_static(REMAINING_HEADER), HeaderValue::from(self.remaining));
        headers.insert(HeaderName::from_static(RESET_HEADER), HeaderValue::from(reset_at));
    }
}

struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        RateLimiter {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Count one request for `key` and decide whether it may proceed.
    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Expired windows are dropped so the map does not grow without bound.
        let window = self.window;
        windows.retain(|_, w| now.duration_since(w.started) < window);

        let entry = windows.entry(key.to_string()).or_insert(Window { started: now, count: 0 });
        let elapsed = now.duration_since(entry.started);
        let reset_after = window.saturating_sub(elapsed).as_secs().max(1);
        if entry.count >= self.limit {
            return RateDecision {
                allowed: false,
                limit: self.limit,
                remaining: 0,
                reset_after,
            };
        }
        entry.count += 1;
        RateDecision {
            allowed: true,
            limit: self.limit,
            remaining: self.limit - entry.count,
            reset_after,
        }
    }
}

/// Client identity for limiting: first X-Forwarded-For hop, then X-Real-IP.
pub fn client_key(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    forwarded.or_else(real_ip).unwrap_or("unknown").to_string()
}
