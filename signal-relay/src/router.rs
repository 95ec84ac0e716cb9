//! Message routing.
//!
//! Classifies each inbound envelope and dispatches it:
//!
//! | type                | action                                           |
//! |---------------------|--------------------------------------------------|
//! | `evaluation`        | nothing                                          |
//! | `signaling_request` | match against the pending set, answer the sender |
//! | anything else       | forward verbatim to `target_id`, or drop          |
//!
//! Before any of that, a connection that is not yet identified registers
//! under the envelope's `id`.

use crate::channel::{ChannelHandle, DeliveryError};
use crate::error::{ProtocolError, ProtocolResult};
use crate::server::{MatchRequest, RelayMetrics, SignalingRelay};
use crate::traffic::Direction;
use signal_types::{ClientId, Envelope, MessageType, SignalingResponse};
use std::sync::Arc;

/// What the router did with one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// `evaluation`: accepted, nothing sent.
    Ignored,
    /// `signaling_request` answered with this peer.
    Matched(ClientId),
    /// `signaling_request` with nobody else waiting.
    Unmatched,
    /// `signaling_request` from a connection whose id now belongs to a
    /// newer connection; not queued.
    Refused,
    /// Forwarded to this target.
    Forwarded(ClientId),
    /// Forward target unknown or unreachable; message dropped.
    Dropped(ClientId),
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// Id the source connection registered under, if this message did it.
    pub registered: Option<ClientId>,
    /// What happened to the message.
    pub action: Action,
}

/// Dispatches envelopes against a shared relay.
#[derive(Debug, Clone)]
pub struct Router {
    relay: Arc<SignalingRelay>,
}

impl Router {
    /// Create a router over `relay`.
    pub fn new(relay: Arc<SignalingRelay>) -> Self {
        Self { relay }
    }

    /// Route one message received on `source`.
    ///
    /// `identity` is the id the source connection already registered
    /// under, or `None` while it is still unidentified. Errors mean the
    /// message was discarded; they never concern other connections.
    pub fn dispatch(
        &self,
        source: &ChannelHandle,
        identity: Option<&ClientId>,
        text: &str,
    ) -> ProtocolResult<Dispatch> {
        self.relay.traffic().record(Direction::Recv, text);

        let envelope = Envelope::parse(text)?;

        let sender = match identity {
            Some(known) => known.clone(),
            None => envelope.id().cloned().ok_or(ProtocolError::MissingIdentity)?,
        };

        if envelope.kind().is_forwarded() && envelope.target_id().is_none() {
            return Err(ProtocolError::MissingTarget {
                kind: envelope.kind().to_string(),
            });
        }

        let registered = if identity.is_none() {
            self.relay.register(sender.clone(), source);
            Some(sender.clone())
        } else {
            if let Some(declared) = envelope.id() {
                if declared != &sender {
                    tracing::debug!(
                        connection = %source.id(),
                        client = %sender,
                        declared = %declared,
                        "Ignoring id change on identified connection"
                    );
                }
            }
            None
        };

        let action = match envelope.kind() {
            MessageType::Evaluation => Action::Ignored,
            MessageType::SignalingRequest => self.handle_signaling_request(source, &sender),
            _ => self.forward(&sender, envelope),
        };

        Ok(Dispatch { registered, action })
    }

    fn handle_signaling_request(&self, source: &ChannelHandle, sender: &ClientId) -> Action {
        let metrics = self.relay.metrics();
        RelayMetrics::incr(&metrics.signaling_requests);

        let target = match self.relay.request_match(source.id(), sender) {
            MatchRequest::Matched(target) => target,
            MatchRequest::Queued => {
                tracing::debug!(client = %sender, "No peer waiting, queued for matchmaking");
                return Action::Unmatched;
            }
            MatchRequest::NotOwner => {
                tracing::debug!(
                    connection = %source.id(),
                    client = %sender,
                    "Superseded connection asked for a match, ignoring"
                );
                return Action::Refused;
            }
        };

        RelayMetrics::incr(&metrics.matches_made);
        tracing::info!(client = %sender, target = %target, "Matched peers");

        match SignalingResponse::offer_to(target.clone()).to_json() {
            Ok(response) => {
                self.send(source, response);
            }
            Err(e) => tracing::error!("Failed to serialize signaling_response: {}", e),
        }
        Action::Matched(target)
    }

    fn forward(&self, sender: &ClientId, envelope: Envelope) -> Action {
        let metrics = self.relay.metrics();
        // Checked by dispatch before any state was touched
        let Some(target) = envelope.target_id().cloned() else {
            return Action::Ignored;
        };

        let Some(channel) = self.relay.lookup(&target) else {
            RelayMetrics::incr(&metrics.forwards_dropped);
            tracing::debug!(
                client = %sender,
                target = %target,
                kind = %envelope.kind(),
                "Dropping message for unknown target"
            );
            return Action::Dropped(target);
        };

        if self.send(&channel, envelope.into_raw()) {
            RelayMetrics::incr(&metrics.forwards_delivered);
            Action::Forwarded(target)
        } else {
            RelayMetrics::incr(&metrics.forwards_dropped);
            Action::Dropped(target)
        }
    }

    /// Record and enqueue `text` on `channel`. Returns whether it was queued.
    fn send(&self, channel: &ChannelHandle, text: String) -> bool {
        self.relay.traffic().record(Direction::Send, &text);
        match channel.deliver(text) {
            Ok(()) => true,
            Err(DeliveryError::Full) => {
                RelayMetrics::incr(&self.relay.metrics().outbound_overflows);
                tracing::warn!(connection = %channel.id(), "Outbound buffer full, message dropped");
                false
            }
            Err(DeliveryError::Closed) => {
                tracing::debug!(connection = %channel.id(), "Target connection closing, message dropped");
                false
            }
        }
    }
}
