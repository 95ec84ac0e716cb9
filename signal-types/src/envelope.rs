//! Envelope - the parsed form of one inbound signaling message.

use serde_json::{Map, Value};
use std::fmt;

use crate::{ClientId, SignalError};

/// Message type discriminator taken from the `type` field.
///
/// Anything the relay does not act on lands in [`MessageType::Other`]
/// and is forwarded like the negotiation types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Telemetry/health signal; accepted and ignored
    Evaluation,
    /// Ask the relay for a peer to negotiate with
    SignalingRequest,
    /// Relay suggestion, forwarded when a peer echoes it
    SignalingResponse,
    /// Session offer
    Offer,
    /// Session answer
    Answer,
    /// Connectivity candidate
    Candidate,
    /// Unrecognized type, forwarded unexamined
    Other(String),
}

impl MessageType {
    /// The wire name of this type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Evaluation => "evaluation",
            Self::SignalingRequest => "signaling_request",
            Self::SignalingResponse => "signaling_response",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Candidate => "candidate",
            Self::Other(name) => name,
        }
    }

    /// Whether the relay routes this type by `target_id`.
    pub fn is_forwarded(&self) -> bool {
        !matches!(self, Self::Evaluation | Self::SignalingRequest)
    }
}

impl From<&str> for MessageType {
    fn from(value: &str) -> Self {
        match value {
            "evaluation" => Self::Evaluation,
            "signaling_request" => Self::SignalingRequest,
            "signaling_response" => Self::SignalingResponse,
            "offer" => Self::Offer,
            "answer" => Self::Answer,
            "candidate" => Self::Candidate,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed inbound envelope.
///
/// The original text is retained so forwarded messages reach the target
/// byte-for-byte as the sender wrote them.
#[derive(Debug, Clone)]
pub struct Envelope {
    kind: MessageType,
    id: Option<ClientId>,
    target_id: Option<ClientId>,
    raw: String,
}

impl Envelope {
    /// Parse an envelope from its JSON text.
    ///
    /// `type` is required. `id` and `target_id` are optional here; the
    /// router decides when they are needed. JSON `null` counts as absent.
    pub fn parse(text: &str) -> Result<Self, SignalError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(fields) = value else {
            return Err(SignalError::NotAnObject);
        };

        let kind = match fields.get("type") {
            Some(Value::String(name)) => MessageType::from(name.as_str()),
            None | Some(Value::Null) => return Err(SignalError::MissingField("type")),
            Some(_) => return Err(SignalError::InvalidField { field: "type" }),
        };
        let id = optional_id(&fields, "id")?;
        let target_id = optional_id(&fields, "target_id")?;

        Ok(Self {
            kind,
            id,
            target_id,
            raw: text.to_string(),
        })
    }

    /// The classified `type` field.
    pub fn kind(&self) -> &MessageType {
        &self.kind
    }

    /// The sender's declared identifier, if present.
    pub fn id(&self) -> Option<&ClientId> {
        self.id.as_ref()
    }

    /// The recipient identifier, if present.
    pub fn target_id(&self) -> Option<&ClientId> {
        self.target_id.as_ref()
    }

    /// Consume the envelope, returning its original text.
    pub fn into_raw(self) -> String {
        self.raw
    }
}

fn optional_id(fields: &Map<String, Value>, field: &'static str) -> Result<Option<ClientId>, SignalError> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) => Ok(Some(ClientId::new(id.as_str()))),
        Some(_) => Err(SignalError::InvalidField { field }),
    }
}
