//! Per-connection session management.
//!
//! Each connection gets a Session that owns its transport, drains its
//! outbound queue, hands inbound messages to the router and cleans up the
//! registry and pending set when the connection goes away.

use crate::channel::{ChannelHandle, ConnectionId};
use crate::error::{ProtocolError, RelayError};
use crate::router::Router;
use crate::server::{RelayMetrics, SignalingRelay};
use crate::traffic::Direction;
use crate::transport::{Transport, TransportError};
use signal_types::ClientId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Session state machine states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no message routed yet.
    Open,
    /// Registered under a client id.
    Identified {
        /// Id taken from the first routed message.
        client_id: ClientId,
    },
    /// Connection is gone. Terminal.
    Closed,
}

/// Releases the connection's registry and pending entries exactly once,
/// on normal exit or when the session task unwinds.
struct ConnectionGuard {
    relay: Arc<SignalingRelay>,
    connection: ConnectionId,
    // Id this connection identified under, kept even after a takeover
    client_id: Option<ClientId>,
    released: bool,
}

impl ConnectionGuard {
    fn release(&mut self) -> Option<ClientId> {
        if self.released {
            return None;
        }
        self.released = true;
        self.relay
            .disconnect(self.connection, self.client_id.as_ref())
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

enum Event {
    CloseRequested,
    Outbound(String),
    Inbound(Option<Result<String, TransportError>>),
    IdentifyTimeout,
}

/// A per-connection session.
pub struct Session<T: Transport> {
    relay: Arc<SignalingRelay>,
    router: Router,
    transport: T,
    channel: ChannelHandle,
    outbound: mpsc::Receiver<String>,
    state: SessionState,
    peer: String,
    guard: ConnectionGuard,
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connection", &self.channel.id())
            .field("peer", &self.peer)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Session<T> {
    /// Create a session for a freshly accepted connection.
    ///
    /// `peer` only labels log lines.
    pub fn new(relay: Arc<SignalingRelay>, transport: T, peer: impl Into<String>) -> Self {
        let (channel, outbound) = relay.open_channel();
        let guard = ConnectionGuard {
            relay: relay.clone(),
            connection: channel.id(),
            client_id: None,
            released: false,
        };
        Self {
            router: Router::new(relay.clone()),
            relay,
            transport,
            channel,
            outbound,
            state: SessionState::Open,
            peer: peer.into(),
            guard,
        }
    }

    /// Relay-assigned id of this connection.
    pub fn connection_id(&self) -> ConnectionId {
        self.channel.id()
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Run the session until the connection closes.
    ///
    /// Per-message errors are logged and survived. A transport fault ends
    /// the session and is returned after cleanup.
    pub async fn run(mut self) -> Result<(), RelayError> {
        let connection = self.channel.id();
        tracing::info!(connection = %connection, peer = %self.peer, "New connection");

        let identify_timeout =
            Duration::from_secs(self.relay.config().limits.identify_timeout_secs);
        let identify_deadline = Instant::now() + identify_timeout;

        let result = loop {
            let identifying = self.state == SessionState::Open;

            let event = tokio::select! {
                biased;
                _ = self.channel.close_requested() => Event::CloseRequested,
                Some(text) = self.outbound.recv() => Event::Outbound(text),
                inbound = self.transport.recv() => Event::Inbound(inbound),
                _ = tokio::time::sleep_until(identify_deadline), if identifying => {
                    Event::IdentifyTimeout
                }
            };

            match event {
                Event::CloseRequested => {
                    tracing::info!(connection = %connection, "Closing superseded connection");
                    break Ok(());
                }
                Event::Outbound(text) => {
                    if let Err(e) = self.transport.send(text).await {
                        break Err(e);
                    }
                }
                Event::Inbound(Some(Ok(text))) => self.handle_message(&text),
                Event::Inbound(Some(Err(e))) => break Err(e),
                Event::Inbound(None) => {
                    tracing::debug!(connection = %connection, "Peer closed connection");
                    break Ok(());
                }
                Event::IdentifyTimeout => {
                    tracing::warn!(
                        connection = %connection,
                        peer = %self.peer,
                        "No identifying message within {}s, closing",
                        identify_timeout.as_secs()
                    );
                    break Ok(());
                }
            }
        };

        if let Err(e) = &result {
            tracing::warn!(connection = %connection, "Transport error: {}", e);
        }
        self.shutdown().await;
        result.map_err(RelayError::from)
    }

    /// Rate-limit, route and track identity for one inbound message.
    fn handle_message(&mut self, text: &str) {
        let metrics = self.relay.metrics();
        RelayMetrics::incr(&metrics.messages_received);

        if let Err(e) = self.relay.rate_limits().check_message(self.channel.id()) {
            RelayMetrics::incr(&metrics.rate_limit_hits);
            self.relay.traffic().record(Direction::Recv, text);
            let err = ProtocolError::RateLimited {
                reason: e.to_string(),
            };
            tracing::warn!(connection = %self.channel.id(), "Dropping message: {}", err);
            return;
        }

        let identity = match &self.state {
            SessionState::Identified { client_id } => Some(client_id),
            SessionState::Open | SessionState::Closed => None,
        };

        match self.router.dispatch(&self.channel, identity, text) {
            Ok(dispatch) => {
                if let Some(client_id) = dispatch.registered {
                    tracing::info!(
                        connection = %self.channel.id(),
                        client = %client_id,
                        "Client identified"
                    );
                    self.guard.client_id = Some(client_id.clone());
                    self.state = SessionState::Identified { client_id };
                }
                tracing::trace!(connection = %self.channel.id(), action = ?dispatch.action, "Routed");
            }
            Err(e) => {
                RelayMetrics::incr(&metrics.malformed_total);
                tracing::warn!(connection = %self.channel.id(), "Discarding message: {}", e);
            }
        }
    }

    async fn shutdown(&mut self) {
        let connection = self.channel.id();
        let previous = std::mem::replace(&mut self.state, SessionState::Closed);

        // Unroutable before the socket goes away
        let freed = self.guard.release();

        if let Err(e) = self.transport.close().await {
            tracing::debug!(connection = %connection, "Error closing transport: {}", e);
        }

        match previous {
            SessionState::Identified { client_id } => tracing::info!(
                connection = %connection,
                client = %client_id,
                released = freed.is_some(),
                "Session closed"
            ),
            _ => tracing::info!(connection = %connection, "Session closed before identifying"),
        }
    }
}
