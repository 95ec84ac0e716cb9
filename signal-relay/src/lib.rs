//! # signal-relay
//!
//! Rendezvous signaling relay for peerlink.
//!
//! This crate implements a relay server that:
//! - Accepts WebSocket connections from peers
//! - Registers each connection under the client id it declares
//! - Pairs peers that ask for a partner (matchmaking)
//! - Forwards offers, answers and candidates to their target verbatim
//!
//! The relay never inspects negotiation payloads. Once two peers have
//! exchanged what they need, they talk directly and the relay is out of
//! the picture.
//!
//! ## Architecture
//!
//! ```text
//! Peer A ──┐                          ┌── Peer B
//!          │       WebSocket          │
//!          ├─────────────────────────►│
//!          │                          │
//!      ┌───┴──────────────────────────┴───┐
//!      │           signal-relay           │
//!      │  Session ─► Router ─► Registry   │
//!      │                   └─► Pending    │
//!      └──────────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! Every message is a JSON object with a `type`:
//! - `evaluation` is accepted and ignored
//! - `signaling_request` → `signaling_response` (peer to offer to)
//! - anything else is forwarded to `target_id`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod http;
pub mod limits;
pub mod matchmaking;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod traffic;
pub mod transport;

pub use config::Config;
pub use error::{ProtocolError, RelayError};
pub use server::SignalingRelay;
pub use session::{Session, SessionState};
