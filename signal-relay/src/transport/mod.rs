//! Transport abstraction for the relay's client connections.
//!
//! A session talks to its client only through [`Transport`], so the same
//! supervisor runs over a real WebSocket in production and over
//! [`MockTransport`] in tests.
//!
//! # Design
//!
//! The transport is owned by exactly one session:
//! - `recv()` yields inbound text frames, `None` once the peer closed
//! - `send()` writes one text frame
//! - `close()` terminates the connection

mod mock;
mod websocket;

pub use mock::{MockPeer, MockTransport};
pub use websocket::WebSocketTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
///
/// Fatal to the session that hit them, and only to it.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The channel is closed.
    #[error("connection closed")]
    Closed,

    /// Writing to the channel failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Reading from the channel failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// Bidirectional text channel to one client.
#[async_trait]
pub trait Transport: Send {
    /// Wait for the next inbound message.
    ///
    /// `None` means the peer closed the connection in an orderly way.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Send one message to the peer.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the connection. Closing twice is not an error.
    async fn close(&mut self) -> Result<(), TransportError>;
}
