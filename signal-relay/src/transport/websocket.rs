//! WebSocket transport over axum's upgraded socket.

use super::{Transport, TransportError};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};

/// [`Transport`] backed by an upgraded axum WebSocket.
///
/// Text frames carry envelopes. Binary frames are accepted when they hold
/// valid UTF-8. Ping/pong is answered by the WebSocket layer and never
/// surfaces here.
pub struct WebSocketTransport {
    socket: WebSocket,
    closed: bool,
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl WebSocketTransport {
    /// Wrap an upgraded socket.
    pub fn new(socket: WebSocket) -> Self {
        Self {
            socket,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            let message = match self.socket.recv().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(TransportError::ReceiveFailed(e.to_string()))),
            };

            match message {
                Message::Text(text) => return Some(Ok(text)),
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => return Some(Ok(text)),
                    Err(e) => {
                        tracing::warn!("Skipping non UTF-8 binary frame: {}", e);
                    }
                },
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Close(frame) => {
                    tracing::debug!(?frame, "Peer sent close frame");
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.socket
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.socket
            .send(Message::Close(None))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}
