//! # signal-types
//!
//! Wire format types for the peerlink signaling relay.
//!
//! This crate provides the types shared by the relay and its clients:
//! - [`ClientId`] - Self-declared peer identifier
//! - [`Envelope`] - Parsed inbound message with its raw text kept for verbatim forwarding
//! - [`MessageType`] - Closed classification of the `type` field
//! - [`SignalingResponse`] - The only envelope the relay synthesizes itself
//! - [`SignalError`] - Error types
//!
//! ## Wire format
//!
//! Every message is a JSON object:
//!
//! ```json
//! {"type": "offer", "id": "alice", "target_id": "bob", "sdp": "..."}
//! ```
//!
//! Only `type`, `id` and `target_id` are examined. Everything else is carried
//! through untouched.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod envelope;
mod error;
mod ids;
mod messages;

pub use envelope::{Envelope, MessageType};
pub use error::SignalError;
pub use ids::ClientId;
pub use messages::{NegotiationRole, SignalingResponse};
