//! WebSocket accept path.
//!
//! Upgrades `GET {server.ws_path}` (and the `/signaling` alias) to a
//! WebSocket and runs one [`Session`] per connection.

use crate::server::{RelayMetrics, SessionPermit, SignalingRelay};
use crate::session::Session;
use crate::transport::WebSocketTransport;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::ConnectInfo;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use std::net::SocketAddr;
use std::sync::Arc;

/// Path that always accepts signaling connections, whatever `ws_path` is.
pub const SIGNALING_ALIAS: &str = "/signaling";

/// Upgrade handler for signaling connections.
///
/// Refuses the upgrade with 429 when the peer's address is over its
/// connection quota and with 503 when the relay is at session capacity.
/// The session slot is reserved before upgrading and held until the
/// session ends.
pub async fn ws_handler(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Extension(relay): Extension<Arc<SignalingRelay>>,
    ws: WebSocketUpgrade,
) -> Response {
    let remote = connect_info.map(|ConnectInfo(addr)| addr);

    // Rate limit check: prevent connection flooding from a single address
    if let Some(addr) = remote {
        if let Err(e) = relay.rate_limits().check_connection(addr.ip()) {
            tracing::warn!("Connection rate limited for {}: {}", addr, e);
            RelayMetrics::incr(&relay.metrics().rate_limit_hits);
            return (StatusCode::TOO_MANY_REQUESTS, "rate limited").into_response();
        }
    }

    let Some(permit) = relay.try_admit() else {
        tracing::warn!(
            "Session limit reached ({}), rejecting {:?}",
            relay.config().limits.max_concurrent_sessions,
            remote
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "too many sessions").into_response();
    };

    let max_size = relay.config().limits.max_message_size;
    let peer = remote.map_or_else(|| "unknown".to_string(), |addr| addr.to_string());
    ws.max_message_size(max_size)
        .max_frame_size(max_size)
        .on_upgrade(move |socket| serve_socket(relay, socket, peer, permit))
}

async fn serve_socket(
    relay: Arc<SignalingRelay>,
    socket: WebSocket,
    peer: String,
    _permit: SessionPermit,
) {
    let session = Session::new(relay, WebSocketTransport::new(socket), peer);

    // Run in its own task so a panic stays with this connection
    match tokio::spawn(session.run()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!("Session ended with error: {}", e),
        Err(e) if e.is_panic() => tracing::error!("Session task panicked: {}", e),
        Err(e) => tracing::debug!("Session task cancelled: {}", e),
    }
}
