//! HTTP endpoints for signal-relay.
//!
//! One axum router carries the WebSocket signaling path, health checks and
//! metrics.

pub mod health;
mod metrics;

use crate::protocol::{ws_handler, SIGNALING_ALIAS};
use crate::server::SignalingRelay;
use axum::{routing::get, Extension, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
pub fn build_router(relay: Arc<SignalingRelay>) -> Router {
    let ws_path = relay.config().server.ws_path.clone();

    let mut router = Router::new()
        .route(&ws_path, get(ws_handler))
        .route("/health", get(health::health_handler))
        .route("/metrics", get(metrics::metrics_handler));
    if ws_path != SIGNALING_ALIAS {
        router = router.route(SIGNALING_ALIAS, get(ws_handler));
    }

    router.layer(Extension(relay))
}

/// Serve the relay on `listener` until `shutdown` resolves.
///
/// Peer addresses are made available to the upgrade handler for per-IP
/// rate limiting.
pub async fn serve<F>(
    listener: TcpListener,
    relay: Arc<SignalingRelay>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(relay);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}
