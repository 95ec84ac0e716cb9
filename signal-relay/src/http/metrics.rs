//! Prometheus metrics endpoint.

use crate::server::SignalingRelay;
use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use std::fmt::Write;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format, or 404 when
/// `http.metrics_enabled` is off.
pub async fn metrics_handler(Extension(relay): Extension<Arc<SignalingRelay>>) -> Response {
    if !relay.config().http.metrics_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        render(&relay),
    )
        .into_response()
}

fn render(relay: &SignalingRelay) -> String {
    let m = relay.metrics();
    let limits = relay.rate_limits();

    // Gauges: current state
    let gauges = [
        (
            "signal_relay_connections_active",
            "Number of live connections",
            relay.open_sessions() as u64,
        ),
        (
            "signal_relay_clients_registered",
            "Number of registered client ids",
            relay.registered_count() as u64,
        ),
        (
            "signal_relay_clients_pending",
            "Number of clients waiting for a match",
            relay.pending_count() as u64,
        ),
        (
            "signal_relay_rate_limit_keys",
            "Number of tracked rate limiter keys",
            (limits.connection_keys_count() + limits.message_keys_count()) as u64,
        ),
    ];

    // Counters: monotonic since startup
    let counters = [
        (
            "signal_relay_connections_total",
            "Total connections accepted",
            &m.connections_total,
        ),
        (
            "signal_relay_messages_received_total",
            "Total messages read from clients",
            &m.messages_received,
        ),
        (
            "signal_relay_forwards_delivered_total",
            "Total messages forwarded to their target",
            &m.forwards_delivered,
        ),
        (
            "signal_relay_forwards_dropped_total",
            "Total forwards dropped (unknown or unreachable target)",
            &m.forwards_dropped,
        ),
        (
            "signal_relay_signaling_requests_total",
            "Total signaling requests handled",
            &m.signaling_requests,
        ),
        (
            "signal_relay_matches_total",
            "Total signaling requests answered with a peer",
            &m.matches_made,
        ),
        (
            "signal_relay_malformed_total",
            "Total messages discarded as malformed",
            &m.malformed_total,
        ),
        (
            "signal_relay_rate_limit_hits_total",
            "Total rate limit rejections",
            &m.rate_limit_hits,
        ),
        (
            "signal_relay_superseded_total",
            "Total registrations that took over an existing id",
            &m.superseded_total,
        ),
        (
            "signal_relay_outbound_overflows_total",
            "Total messages lost to a full outbound buffer",
            &m.outbound_overflows,
        ),
    ];

    let mut body = String::new();
    for (name, help, value) in gauges {
        let _ = writeln!(body, "# HELP {name} {help}\n# TYPE {name} gauge\n{name} {value}\n");
    }
    let _ = writeln!(
        body,
        "# HELP signal_relay_info Server information\n# TYPE signal_relay_info gauge\nsignal_relay_info{{version=\"{}\"}} 1\n",
        env!("CARGO_PKG_VERSION")
    );
    for (name, help, counter) in counters {
        let value = counter.load(Ordering::Relaxed);
        let _ = writeln!(body, "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n");
    }
    body
}
