//! Main SignalingRelay service object.
//!
//! SignalingRelay owns the registry and the pending set, and is shared by
//! every session through an `Arc`. Both structures sit behind one mutex so
//! that register/lookup/remove and request_match/discard are atomic with
//! respect to each other, whatever thread a session runs on.

use crate::channel::{ChannelHandle, ConnectionId};
use crate::config::Config;
use crate::limits::RateLimits;
use crate::matchmaking::PendingSet;
use crate::registry::{Registration, Registry};
use crate::traffic::{TracingTrafficLog, TrafficLog};
use parking_lot::Mutex;
use signal_types::ClientId;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Operational metrics for monitoring relay activity.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total connections accepted.
    pub connections_total: AtomicU64,
    /// Total inbound messages read from clients.
    pub messages_received: AtomicU64,
    /// Total messages forwarded to a registered target.
    pub forwards_delivered: AtomicU64,
    /// Total forwards dropped (unknown target, closed or full channel).
    pub forwards_dropped: AtomicU64,
    /// Total signaling requests handled.
    pub signaling_requests: AtomicU64,
    /// Total signaling requests that produced a match.
    pub matches_made: AtomicU64,
    /// Total malformed messages discarded.
    pub malformed_total: AtomicU64,
    /// Total rate limit rejections (connection + message + global).
    pub rate_limit_hits: AtomicU64,
    /// Total registrations that took an id over from another connection.
    pub superseded_total: AtomicU64,
    /// Total messages lost to a full outbound buffer.
    pub outbound_overflows: AtomicU64,
}

impl RelayMetrics {
    /// Bump a counter by one.
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Outcome of [`SignalingRelay::request_match`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchRequest {
    /// Paired with this waiting peer; the requester now waits too.
    Matched(ClientId),
    /// Nobody else is waiting; the requester now waits.
    Queued,
    /// The connection no longer owns the id it asked under. Nothing changed.
    NotOwner,
}

/// Slot counted against `limits.max_concurrent_sessions`.
///
/// Taken before a WebSocket upgrade and released on drop, so a failed
/// upgrade gives its slot back.
#[derive(Debug)]
pub struct SessionPermit {
    admitted: Arc<AtomicUsize>,
}

impl Drop for SessionPermit {
    fn drop(&mut self) {
        self.admitted.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Registry and pending set, guarded together.
#[derive(Debug, Default)]
struct RelayState {
    registry: Registry,
    pending: PendingSet,
}

/// Main relay service.
pub struct SignalingRelay {
    config: Config,
    state: Mutex<RelayState>,
    /// Rate limiters for connections and messages.
    rate_limits: RateLimits,
    /// Operational metrics (counters, gauges).
    metrics: RelayMetrics,
    /// Receives every inbound and relay-sent envelope.
    traffic: Arc<dyn TrafficLog>,
    next_connection: AtomicU64,
    open_sessions: AtomicUsize,
    admitted: Arc<AtomicUsize>,
    started_at: Instant,
}

impl std::fmt::Debug for SignalingRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalingRelay")
            .field("config", &self.config)
            .field("rate_limits", &self.rate_limits)
            .field("metrics", &self.metrics)
            .field("open_sessions", &self.open_sessions())
            .finish_non_exhaustive()
    }
}

impl SignalingRelay {
    /// Create a relay that logs traffic through `tracing`.
    pub fn new(config: Config) -> Self {
        Self::with_traffic_log(config, Arc::new(TracingTrafficLog))
    }

    /// Create a relay with a custom traffic sink.
    pub fn with_traffic_log(config: Config, traffic: Arc<dyn TrafficLog>) -> Self {
        let rate_limits = RateLimits::new(&config.limits);
        Self {
            config,
            state: Mutex::new(RelayState::default()),
            rate_limits,
            metrics: RelayMetrics::default(),
            traffic,
            next_connection: AtomicU64::new(1),
            open_sessions: AtomicUsize::new(0),
            admitted: Arc::new(AtomicUsize::new(0)),
            started_at: Instant::now(),
        }
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get access to the rate limiters.
    pub fn rate_limits(&self) -> &RateLimits {
        &self.rate_limits
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Get the traffic sink.
    pub fn traffic(&self) -> &dyn TrafficLog {
        self.traffic.as_ref()
    }

    /// When this relay was created.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Reserve a session slot, or `None` when the relay is at capacity.
    ///
    /// Check and increment are one atomic step, so concurrent upgrades
    /// cannot overshoot the cap.
    pub fn try_admit(&self) -> Option<SessionPermit> {
        let max = self.config.limits.max_concurrent_sessions;
        self.admitted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .ok()
            .map(|_| SessionPermit {
                admitted: self.admitted.clone(),
            })
    }

    /// Number of outstanding session permits.
    pub fn admitted_sessions(&self) -> usize {
        self.admitted.load(Ordering::Acquire)
    }

    /// Allocate a channel for a new connection.
    ///
    /// Counts as an open session until [`SignalingRelay::disconnect`] is
    /// called for it.
    pub fn open_channel(&self) -> (ChannelHandle, tokio::sync::mpsc::Receiver<String>) {
        let id = ConnectionId::new(self.next_connection.fetch_add(1, Ordering::Relaxed));
        self.open_sessions.fetch_add(1, Ordering::Relaxed);
        RelayMetrics::incr(&self.metrics.connections_total);
        ChannelHandle::new(id, self.config.limits.outbound_buffer)
    }

    /// Register `id` for `channel`, overwriting any previous owner.
    pub fn register(&self, id: ClientId, channel: &ChannelHandle) {
        let outcome = self.state.lock().registry.register(id.clone(), channel.clone());

        match outcome {
            Registration::Inserted => {
                tracing::debug!(client = %id, connection = %channel.id(), "Registered client");
            }
            Registration::Unchanged => {}
            Registration::Superseded(previous) => {
                RelayMetrics::incr(&self.metrics.superseded_total);
                tracing::warn!(
                    client = %id,
                    connection = %channel.id(),
                    superseded = %previous.id(),
                    "Client id taken over by a new connection"
                );
                if self.config.registry.close_superseded {
                    previous.request_close();
                }
            }
        }
    }

    /// Current channel for `id`.
    pub fn lookup(&self, id: &ClientId) -> Option<ChannelHandle> {
        self.state.lock().registry.lookup(id.as_str()).cloned()
    }

    /// Whether `id` is registered.
    pub fn is_registered(&self, id: &ClientId) -> bool {
        self.state.lock().registry.contains(id.as_str())
    }

    /// Pick a waiting peer for `id` and enqueue `id` for future matches.
    ///
    /// Only the connection currently registered under `id` may ask; a
    /// superseded connection gets [`MatchRequest::NotOwner`] and the
    /// pending set is left alone.
    pub fn request_match(&self, connection: ConnectionId, id: &ClientId) -> MatchRequest {
        let mut state = self.state.lock();
        if state.registry.client_id(connection) != Some(id) {
            return MatchRequest::NotOwner;
        }
        match state.pending.request_match(id) {
            Some(target) => MatchRequest::Matched(target),
            None => MatchRequest::Queued,
        }
    }

    /// Remove `id` from the pending set.
    pub fn discard(&self, id: &ClientId) {
        self.state.lock().pending.discard(id);
    }

    /// Whether `id` is waiting for a match.
    pub fn is_pending(&self, id: &ClientId) -> bool {
        self.state.lock().pending.contains(id)
    }

    /// Tear down everything a closed connection left behind.
    ///
    /// Removes the registry entry still owned by `connection` and, in the
    /// same critical section, drops from the pending set both the freed id
    /// and `known` (the id the session identified under) unless another
    /// live connection owns it. Returns the freed id. Safe to call for
    /// connections that never registered or lost their id to a newer
    /// connection.
    pub fn disconnect(
        &self,
        connection: ConnectionId,
        known: Option<&ClientId>,
    ) -> Option<ClientId> {
        let freed = {
            let mut state = self.state.lock();
            let freed = state.registry.remove(connection);
            for id in freed.iter().chain(known) {
                if !state.registry.contains(id.as_str()) {
                    state.pending.discard(id);
                }
            }
            freed
        };

        // Saturating decrement: disconnect is idempotent
        let _ = self
            .open_sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));

        tracing::debug!(
            connection = %connection,
            client = ?freed,
            "Connection cleaned up"
        );
        freed
    }

    /// Number of registered clients.
    pub fn registered_count(&self) -> usize {
        self.state.lock().registry.len()
    }

    /// Number of clients waiting for a match.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Waiting clients in arrival order.
    pub fn pending_snapshot(&self) -> Vec<ClientId> {
        self.state.lock().pending.iter().cloned().collect()
    }

    /// Number of connections with a live session.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay() -> SignalingRelay {
        SignalingRelay::new(Config::default())
    }

    #[test]
    fn register_lookup_disconnect() {
        let relay = relay();
        let (channel, _rx) = relay.open_channel();
        let id = ClientId::from("A");

        relay.register(id.clone(), &channel);
        assert_eq!(relay.lookup(&id).map(|c| c.id()), Some(channel.id()));
        assert_eq!(relay.registered_count(), 1);
        assert_eq!(relay.open_sessions(), 1);

        assert_eq!(relay.disconnect(channel.id(), Some(&id)), Some(id.clone()));
        assert!(relay.lookup(&id).is_none());
        assert_eq!(relay.open_sessions(), 0);
    }

    #[test]
    fn disconnect_purges_pending() {
        let relay = relay();
        let (channel, _rx) = relay.open_channel();
        let id = ClientId::from("A");

        relay.register(id.clone(), &channel);
        assert_eq!(relay.request_match(channel.id(), &id), MatchRequest::Queued);
        assert!(relay.is_pending(&id));

        relay.disconnect(channel.id(), Some(&id));
        assert!(!relay.is_pending(&id));
        assert_eq!(relay.pending_count(), 0);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let relay = relay();
        let (channel, _rx) = relay.open_channel();
        relay.register(ClientId::from("A"), &channel);

        relay.disconnect(channel.id(), None);
        assert_eq!(relay.disconnect(channel.id(), None), None);
        assert_eq!(relay.open_sessions(), 0);
    }

    #[test]
    fn superseded_connection_disconnect_keeps_new_owner() {
        let relay = relay();
        let (old, _old_rx) = relay.open_channel();
        let (new, _new_rx) = relay.open_channel();
        let id = ClientId::from("A");

        relay.register(id.clone(), &old);
        relay.request_match(old.id(), &id);
        relay.register(id.clone(), &new);
        assert_eq!(relay.metrics().superseded_total.load(Ordering::Relaxed), 1);

        assert_eq!(relay.disconnect(old.id(), Some(&id)), None);
        assert_eq!(relay.lookup(&id).map(|c| c.id()), Some(new.id()));
        assert!(relay.is_pending(&id));
    }

    #[test]
    fn superseded_connection_cannot_queue() {
        let relay = relay();
        let (old, _old_rx) = relay.open_channel();
        let (new, _new_rx) = relay.open_channel();
        let id = ClientId::from("A");

        relay.register(id.clone(), &old);
        relay.register(id.clone(), &new);

        assert_eq!(relay.request_match(old.id(), &id), MatchRequest::NotOwner);
        assert!(!relay.is_pending(&id));
    }

    #[test]
    fn no_ghost_pending_after_new_owner_leaves() {
        let relay = relay();
        let (old, _old_rx) = relay.open_channel();
        let (new, _new_rx) = relay.open_channel();
        let (late, _late_rx) = relay.open_channel();
        let a = ClientId::from("A");
        let b = ClientId::from("B");

        relay.register(a.clone(), &old);
        relay.register(a.clone(), &new);
        relay.disconnect(new.id(), Some(&a));

        // the superseded connection asks after the owner is gone
        assert_eq!(relay.request_match(old.id(), &a), MatchRequest::NotOwner);
        relay.disconnect(old.id(), Some(&a));
        assert_eq!(relay.pending_count(), 0);
        assert_eq!(relay.registered_count(), 0);

        relay.register(b.clone(), &late);
        assert_eq!(relay.request_match(late.id(), &b), MatchRequest::Queued);
    }

    #[test]
    fn disconnect_discards_known_id_left_unowned() {
        let relay = relay();
        let (old, _old_rx) = relay.open_channel();
        let (new, _new_rx) = relay.open_channel();
        let id = ClientId::from("A");

        relay.register(id.clone(), &old);
        relay.request_match(old.id(), &id);
        relay.register(id.clone(), &new);
        relay.disconnect(new.id(), None);
        assert!(relay.is_pending(&id));

        // the old session still knows the id it identified under
        relay.disconnect(old.id(), Some(&id));
        assert!(!relay.is_pending(&id));
    }

    #[tokio::test]
    async fn superseded_connection_is_closed_when_configured() {
        let mut config = Config::default();
        config.registry.close_superseded = true;
        let relay = SignalingRelay::new(config);
        let (old, _old_rx) = relay.open_channel();
        let (new, _new_rx) = relay.open_channel();

        relay.register(ClientId::from("A"), &old);
        relay.register(ClientId::from("A"), &new);

        tokio::time::timeout(std::time::Duration::from_millis(100), old.close_requested())
            .await
            .expect("old connection should be asked to close");
    }

    #[test]
    fn pending_snapshot_in_arrival_order() {
        let relay = relay();
        let mut channels = Vec::new();
        for name in ["A", "B", "C"] {
            let (channel, rx) = relay.open_channel();
            relay.register(ClientId::from(name), &channel);
            relay.request_match(channel.id(), &ClientId::from(name));
            channels.push(rx);
        }
        assert_eq!(
            relay.pending_snapshot(),
            vec![ClientId::from("A"), ClientId::from("B"), ClientId::from("C")]
        );
    }

    #[test]
    fn session_permits_respect_cap() {
        let mut config = Config::default();
        config.limits.max_concurrent_sessions = 2;
        let relay = SignalingRelay::new(config);

        let first = relay.try_admit();
        let second = relay.try_admit();
        assert!(first.is_some() && second.is_some());
        assert!(relay.try_admit().is_none());
        assert_eq!(relay.admitted_sessions(), 2);

        drop(first);
        assert_eq!(relay.admitted_sessions(), 1);
        assert!(relay.try_admit().is_some());
    }

    #[test]
    fn concurrent_admission_never_exceeds_cap() {
        let mut config = Config::default();
        config.limits.max_concurrent_sessions = 4;
        let relay = Arc::new(SignalingRelay::new(config));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let relay = relay.clone();
                std::thread::spawn(move || relay.try_admit())
            })
            .collect();
        let permits: Vec<_> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect();

        assert_eq!(permits.len(), 4);
        assert_eq!(relay.admitted_sessions(), 4);
    }

    #[test]
    fn connection_ids_are_unique() {
        let relay = relay();
        let (a, _ra) = relay.open_channel();
        let (b, _rb) = relay.open_channel();
        assert_ne!(a.id(), b.id());
        assert_eq!(relay.metrics().connections_total.load(Ordering::Relaxed), 2);
    }
}
