//! Traffic log sink.
//!
//! Every inbound envelope and every envelope the relay sends is recorded
//! with a direction marker. Recording is observation only and never
//! influences routing.

use std::fmt;

/// `tracing` target used by [`TracingTrafficLog`].
///
/// The binary can route this target to its own file.
pub const TRAFFIC_TARGET: &str = "traffic";

/// Which way an envelope travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Received from a client.
    Recv,
    /// Sent by the relay.
    Send,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recv => f.write_str("[RECV]"),
            Self::Send => f.write_str("[SEND]"),
        }
    }
}

/// Sink for traffic records.
pub trait TrafficLog: Send + Sync + fmt::Debug {
    /// Record one envelope as it appeared on the wire.
    fn record(&self, direction: Direction, envelope: &str);
}

/// Emits traffic records as `tracing` events on [`TRAFFIC_TARGET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTrafficLog;

impl TrafficLog for TracingTrafficLog {
    fn record(&self, direction: Direction, envelope: &str) {
        tracing::info!(target: TRAFFIC_TARGET, "{} {}", direction, envelope);
    }
}

/// Keeps records in memory for assertions.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryTrafficLog {
    records: parking_lot::Mutex<Vec<(Direction, String)>>,
}

#[cfg(test)]
impl MemoryTrafficLog {
    pub(crate) fn records(&self) -> Vec<(Direction, String)> {
        self.records.lock().clone()
    }

    pub(crate) fn count(&self, direction: Direction) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|(d, _)| *d == direction)
            .count()
    }
}

#[cfg(test)]
impl TrafficLog for MemoryTrafficLog {
    fn record(&self, direction: Direction, envelope: &str) {
        self.records.lock().push((direction, envelope.to_string()));
    }
}
