//! Messages the relay synthesizes itself.
//!
//! Everything else on the wire is client-authored and passes through the
//! relay as opaque text.

use serde::{Deserialize, Serialize};

use crate::{ClientId, SignalError};

/// Which side of the negotiation the recipient is asked to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationRole {
    /// Recipient should create and send an offer
    Offer,
}

/// Matchmaking result sent to the peer that issued `signaling_request`.
///
/// Serializes as
/// `{"type":"signaling_response","target_id":"<id>","request":"offer"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "signaling_response")]
pub struct SignalingResponse {
    /// The peer the requester should negotiate with
    pub target_id: ClientId,
    /// What the requester should send first
    pub request: NegotiationRole,
}

impl SignalingResponse {
    /// Ask the requester to open negotiation with `target_id` by sending an offer.
    pub fn offer_to(target_id: ClientId) -> Self {
        Self {
            target_id,
            request: NegotiationRole::Offer,
        }
    }

    /// Serialize to wire JSON.
    pub fn to_json(&self) -> Result<String, SignalError> {
        serde_json::to_string(self).map_err(SignalError::Json)
    }
}
