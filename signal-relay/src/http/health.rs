//! Health check endpoint.

use crate::server::SignalingRelay;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Overall status.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Number of registered client ids.
    pub registered: usize,
    /// Number of clients waiting for a match.
    pub pending: usize,
    /// Number of live connections.
    pub connections: usize,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Health check handler.
pub async fn health_handler(
    Extension(relay): Extension<Arc<SignalingRelay>>,
) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        registered: relay.registered_count(),
        pending: relay.pending_count(),
        connections: relay.open_sessions(),
        uptime_seconds: relay.started_at().elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_serializes() {
        let status = HealthStatus {
            status: "ok".to_string(),
            version: "0.1.0".to_string(),
            registered: 12,
            pending: 3,
            connections: 14,
            uptime_seconds: 3600,
        };

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"registered\":12"));
        assert!(json.contains("\"pending\":3"));
    }
}
