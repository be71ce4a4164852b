//! Routes, middleware stack, and the listener loop.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::cors::cors_layer;
use super::rate_limit::{RateLimiter, rate_limit_middleware};
use crate::config::Config;
use crate::db::Database;

/// State shared by every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Self {
        Self {
            config: Arc::new(config),
            db,
        }
    }
}

#[derive(Serialize)]
struct StatusBody {
    status: &'static str,
}

#[derive(Serialize)]
struct MessageBody {
    message: &'static str,
}

/// Liveness plus a database round trip.
async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.ping().await {
        Ok(()) => (StatusCode::OK, Json(StatusBody { status: "ok" })),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(StatusBody {
                    status: "unavailable",
                }),
            )
        }
    }
}

async fn ping() -> Json<MessageBody> {
    Json(MessageBody { message: "pong" })
}

/// Build the router with all routes and configured middleware.
pub fn build_router(state: AppState) -> Router {
    let server = &state.config.server;
    let rate_limit = &state.config.security.rate_limit;

    let mut router = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/v1/ping", get(ping));

    if !server.write_timeout.is_zero() {
        router = router.layer(TimeoutLayer::new(server.write_timeout));
    }
    if !server.read_timeout.is_zero() {
        router = router.layer(RequestBodyTimeoutLayer::new(server.read_timeout));
    }

    if rate_limit.enabled {
        if rate_limit.rps == 0 {
            warn!("Rate limiting enabled with rps = 0; not enforcing");
        } else {
            let limiter = Arc::new(RateLimiter::new(rate_limit.rps));
            router = router.layer(middleware::from_fn_with_state(
                limiter,
                rate_limit_middleware,
            ));
        }
    }

    router
        .layer(cors_layer(&server.cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    state: AppState,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Bind `0.0.0.0:<server.port>` and serve until Ctrl-C or SIGTERM.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.server.port));
    let listener = TcpListener::bind(addr).await?;
    info!(
        addr = %listener.local_addr()?,
        env = %state.config.server.env,
        "HTTP server listening"
    );

    serve_with_shutdown(listener, state.clone(), shutdown_signal()).await?;

    state.db.close();
    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
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
    info!("Shutdown signal received");
}
