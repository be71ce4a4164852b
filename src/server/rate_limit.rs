//! Token-bucket rate limiting from `security.rate_limit`.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::warn;

struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

/// One bucket shared by every request. Refills at `rps` tokens per second
/// and holds at most `rps` tokens.
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    rps: f64,
}

impl RateLimiter {
    pub fn new(rps: u32) -> Self {
        let rps = f64::from(rps);
        Self {
            bucket: Mutex::new(TokenBucket {
                tokens: rps,
                last_update: Instant::now(),
            }),
            rps,
        }
    }

    /// Take one token if available.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_update).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rps).min(self.rps);
        bucket.last_update = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Reject with `429 Too Many Requests` once the bucket is empty.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    if limiter.try_acquire() {
        next.run(request).await
    } else {
        warn!(path = %request.uri().path(), "Rate limit exceeded");
        (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response()
    }
}
