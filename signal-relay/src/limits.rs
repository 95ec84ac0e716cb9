//! Rate limiting for signal-relay.
//!
//! Provides protection against connection flooding and message spam.
//!
//! ## Design Notes
//!
//! Client ids are self-declared and unauthenticated, so they make a poor
//! rate limiting key. Instead we limit by:
//! - **IP address** for connection attempts
//! - **ConnectionId** for inbound messages
//! - a single global bucket for aggregate message throughput
//!
//! Keyed limiters use the governor crate backed by DashMap.

use crate::channel::ConnectionId;
use crate::config::LimitsConfig;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Type alias for a keyed rate limiter using DashMap.
type KeyedLimiter<K> = RateLimiter<
    K,
    dashmap::DashMap<K, InMemoryState>,
    DefaultClock,
    NoOpMiddleware<governor::clock::QuantaInstant>,
>;

/// Type alias for a direct (non-keyed) rate limiter.
type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiters for the relay server.
#[derive(Clone)]
pub struct RateLimits {
    /// Limits connection attempts per IP address.
    connection_limiter: Arc<KeyedLimiter<IpAddr>>,

    /// Limits inbound messages per connection.
    message_limiter: Arc<KeyedLimiter<ConnectionId>>,

    /// Global message limiter across all connections.
    global_limiter: Arc<DirectLimiter>,
}

impl std::fmt::Debug for RateLimits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimits")
            .field("connection_limiter", &"KeyedLimiter<IpAddr>")
            .field("message_limiter", &"KeyedLimiter<ConnectionId>")
            .field("global_limiter", &"DirectLimiter")
            .finish()
    }
}

/// Zero would make governor reject everything; treat it as one.
fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

impl RateLimits {
    /// Create rate limiters from configuration.
    pub fn new(config: &LimitsConfig) -> Self {
        let connection_quota = Quota::per_minute(non_zero(config.connections_per_ip));
        let message_quota = Quota::per_minute(non_zero(config.messages_per_minute));
        let global_quota = Quota::per_second(non_zero(config.global_messages_per_second));

        Self {
            connection_limiter: Arc::new(RateLimiter::keyed(connection_quota)),
            message_limiter: Arc::new(RateLimiter::keyed(message_quota)),
            global_limiter: Arc::new(RateLimiter::direct(global_quota)),
        }
    }

    /// Check if a connection attempt from `ip` is allowed.
    pub fn check_connection(&self, ip: IpAddr) -> Result<(), RateLimitError> {
        self.connection_limiter
            .check_key(&ip)
            .map_err(|_| RateLimitError::ConnectionLimitExceeded)
    }

    /// Check if an inbound message on `connection` is allowed.
    ///
    /// The global budget is consulted first so a noisy connection cannot
    /// starve the per-connection buckets of others.
    pub fn check_message(&self, connection: ConnectionId) -> Result<(), RateLimitError> {
        self.global_limiter
            .check()
            .map_err(|_| RateLimitError::GlobalLimitExceeded)?;
        self.message_limiter
            .check_key(&connection)
            .map_err(|_| RateLimitError::MessageLimitExceeded)
    }

    /// Get the number of tracked connection keys (for metrics).
    pub fn connection_keys_count(&self) -> usize {
        self.connection_limiter.len()
    }

    /// Get the number of tracked message keys (for metrics).
    pub fn message_keys_count(&self) -> usize {
        self.message_limiter.len()
    }

    /// Evict idle entries from the keyed limiters.
    ///
    /// Closed connections and quiet IPs leave entries behind;
    /// `retain_recent()` drops those whose cells have fully recharged.
    pub fn shrink(&self) {
        self.connection_limiter.retain_recent();
        self.message_limiter.retain_recent();
    }
}

/// Rate limit error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// Too many connection attempts from this address.
    ConnectionLimitExceeded,
    /// Too many messages on this connection.
    MessageLimitExceeded,
    /// Global message rate exceeded across all connections.
    GlobalLimitExceeded,
}

impl std::fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionLimitExceeded => {
                write!(f, "connection rate limit exceeded")
            }
            Self::MessageLimitExceeded => {
                write!(f, "message rate limit exceeded")
            }
            Self::GlobalLimitExceeded => {
                write!(f, "global rate limit exceeded")
            }
        }
    }
}

impl std::error::Error for RateLimitError {}
