//! Non-owning handles to a connection's outbound queue.
//!
//! A session owns its transport. Everyone else (the registry, other
//! sessions' routers) reaches it through a [`ChannelHandle`], which can only
//! enqueue text or ask the owning session to close.

use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// Relay-assigned identity of one live connection.
///
/// Unlike a [`signal_types::ClientId`] this is unique for the lifetime of
/// the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw connection number.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Why an enqueue did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The connection's outbound buffer is full.
    Full,
    /// The owning session has gone away.
    Closed,
}

/// Cloneable sender side of a connection.
#[derive(Clone)]
pub struct ChannelHandle {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
    close: Arc<Notify>,
}

impl fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("id", &self.id)
            .field("closed", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}

impl ChannelHandle {
    /// Create a handle and the receiver its owning session drains.
    pub fn new(id: ConnectionId, buffer: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = Self {
            id,
            tx,
            close: Arc::new(Notify::new()),
        };
        (handle, rx)
    }

    /// The connection this handle points at.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Enqueue a message without waiting.
    ///
    /// Never blocks the caller on a slow peer: a full buffer is reported
    /// back instead.
    pub fn deliver(&self, text: String) -> Result<(), DeliveryError> {
        self.tx.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Ask the owning session to shut down.
    pub fn request_close(&self) {
        self.close.notify_one();
    }

    /// Resolves once [`ChannelHandle::request_close`] has been called.
    pub async fn close_requested(&self) {
        self.close.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn deliver_reaches_receiver() {
        let (handle, mut rx) = ChannelHandle::new(ConnectionId::new(1), 4);
        handle.deliver("hello".to_string()).unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[test]
    fn full_buffer_is_reported() {
        let (handle, _rx) = ChannelHandle::new(ConnectionId::new(1), 1);
        handle.deliver("one".to_string()).unwrap();
        assert_eq!(handle.deliver("two".to_string()), Err(DeliveryError::Full));
    }

    #[test]
    fn dropped_receiver_is_closed() {
        let (handle, rx) = ChannelHandle::new(ConnectionId::new(1), 4);
        drop(rx);
        assert_eq!(handle.deliver("x".to_string()), Err(DeliveryError::Closed));
    }

    #[tokio::test]
    async fn close_request_is_remembered() {
        let (handle, _rx) = ChannelHandle::new(ConnectionId::new(3), 4);
        let remote = handle.clone();
        // Requested before anyone waits: the permit is stored
        remote.request_close();
        tokio::time::timeout(Duration::from_millis(100), handle.close_requested())
            .await
            .expect("close request should be observed");
    }

    #[test]
    fn connection_id_display() {
        assert_eq!(ConnectionId::new(42).to_string(), "conn-42");
    }
}
