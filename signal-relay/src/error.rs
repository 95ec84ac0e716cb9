//! Error types for signal-relay.

pub use crate::transport::TransportError;
use signal_types::SignalError;

/// Error that ends a session.
///
/// Configuration and bind failures surface through `anyhow` in the
/// binary; per-message problems are [`ProtocolError`] and never end a
/// session.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Per-message failures.
///
/// None of these end a session: the supervisor logs the error, drops the
/// message and keeps reading.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The envelope could not be decoded.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] SignalError),

    /// First message on a connection did not carry an `id`.
    #[error("first message on a connection must carry an `id`")]
    MissingIdentity,

    /// A forwarded message did not say where it was going.
    #[error("`{kind}` message has no `target_id`")]
    MissingTarget {
        /// Wire type of the message.
        kind: String,
    },

    /// The connection or the relay as a whole is over its message quota.
    #[error("rate limit exceeded: {reason}")]
    RateLimited {
        /// Which limit was hit.
        reason: String,
    },
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_display() {
        let err = ProtocolError::MissingTarget {
            kind: "offer".to_string(),
        };
        assert_eq!(err.to_string(), "`offer` message has no `target_id`");

        let err = ProtocolError::from(SignalError::NotAnObject);
        assert_eq!(
            err.to_string(),
            "malformed envelope: envelope is not a JSON object"
        );
    }

    #[test]
    fn transport_error_wraps_into_relay_error() {
        let err: RelayError = TransportError::SendFailed("broken pipe".into()).into();
        assert_eq!(err.to_string(), "transport error: send failed: broken pipe");
    }
}
