//! Mock transport for testing.
//!
//! [`MockTransport::pair`] returns the relay side and a [`MockPeer`] that
//! plays the client: it pushes inbound frames, observes what the relay
//! sent, and can inject faults.

use super::{Transport, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct Faults {
    fail_next_send: Mutex<Option<String>>,
    closed: AtomicBool,
}

/// Relay side of an in-memory connection.
#[derive(Debug)]
pub struct MockTransport {
    inbound: mpsc::UnboundedReceiver<Result<String, TransportError>>,
    outbound: mpsc::UnboundedSender<String>,
    faults: Arc<Faults>,
}

/// Client side of an in-memory connection.
#[derive(Debug)]
pub struct MockPeer {
    inbound: Option<mpsc::UnboundedSender<Result<String, TransportError>>>,
    outbound: mpsc::UnboundedReceiver<String>,
    faults: Arc<Faults>,
}

impl MockTransport {
    /// Create a connected transport/peer pair.
    pub fn pair() -> (MockTransport, MockPeer) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let faults = Arc::new(Faults::default());
        let transport = MockTransport {
            inbound: in_rx,
            outbound: out_tx,
            faults: faults.clone(),
        };
        let peer = MockPeer {
            inbound: Some(in_tx),
            outbound: out_rx,
            faults,
        };
        (transport, peer)
    }
}

impl MockPeer {
    /// Queue a message for the relay to receive.
    pub fn push(&self, text: impl Into<String>) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Ok(text.into()));
        }
    }

    /// Make the relay's next `recv()` fail.
    pub fn fail_recv(&self, error: &str) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Err(TransportError::ReceiveFailed(error.to_string())));
        }
    }

    /// Make the relay's next `send()` fail.
    pub fn fail_next_send(&self, error: &str) {
        *self.faults.fail_next_send.lock() = Some(error.to_string());
    }

    /// Close the client side; the relay's `recv()` then returns `None`.
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }

    /// Wait for the next message the relay sent.
    ///
    /// `None` once the relay side is gone and everything was read.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    /// Next message the relay sent, if one is already there.
    pub fn try_next_sent(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    /// Whether the relay called `close()`.
    pub fn is_closed(&self) -> bool {
        self.faults.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        if self.faults.closed.load(Ordering::SeqCst) {
            return None;
        }
        self.inbound.recv().await
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        if self.faults.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        // Check for forced failure
        if let Some(error) = self.faults.fail_next_send.lock().take() {
            return Err(TransportError::SendFailed(error));
        }

        self.outbound
            .send(text)
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.faults.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pushed_messages_are_received_in_order() {
        let (mut transport, peer) = MockTransport::pair();
        peer.push("one");
        peer.push("two");

        assert_eq!(transport.recv().await.unwrap().unwrap(), "one");
        assert_eq!(transport.recv().await.unwrap().unwrap(), "two");
    }

    #[tokio::test]
    async fn sent_messages_reach_peer() {
        let (mut transport, mut peer) = MockTransport::pair();
        transport.send("hello".to_string()).await.unwrap();
        assert_eq!(peer.next_sent().await.as_deref(), Some("hello"));
        assert!(peer.try_next_sent().is_none());
    }

    #[tokio::test]
    async fn hang_up_ends_stream() {
        let (mut transport, mut peer) = MockTransport::pair();
        peer.push("last");
        peer.hang_up();

        assert!(transport.recv().await.unwrap().is_ok());
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn injected_faults() {
        let (mut transport, peer) = MockTransport::pair();

        peer.fail_next_send("broken pipe");
        let err = transport.send("x".to_string()).await.unwrap_err();
        assert!(matches!(err, TransportError::SendFailed(ref m) if m == "broken pipe"));
        // Only the next send fails
        assert!(transport.send("y".to_string()).await.is_ok());

        peer.fail_recv("reset");
        assert!(matches!(
            transport.recv().await,
            Some(Err(TransportError::ReceiveFailed(_)))
        ));
    }

    #[tokio::test]
    async fn close_is_visible_and_idempotent() {
        let (mut transport, peer) = MockTransport::pair();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        assert!(peer.is_closed());
        assert!(matches!(
            transport.send("x".to_string()).await,
            Err(TransportError::Closed)
        ));
    }
}
