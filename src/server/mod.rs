//! HTTP service wiring.
//!
//! Everything here reads the resolved [`Config`](crate::config::Config); no
//! handler carries configuration logic of its own.

mod cors;
mod rate_limit;
mod router;

pub use cors::cors_layer;
pub use rate_limit::{RateLimiter, rate_limit_middleware};
pub use router::{AppState, build_router, serve, serve_with_shutdown};
