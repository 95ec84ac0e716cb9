//! Background housekeeping task.
//!
//! Runs periodically to evict idle rate limiter keys and report the size
//! of the registry and pending set.

use crate::config::CleanupConfig;
use crate::server::SignalingRelay;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Spawn a background cleanup task.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_task(
    relay: Arc<SignalingRelay>,
    config: CleanupConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Cleanup task disabled");
            return;
        }

        let interval_secs = config.interval_secs.max(1);
        tracing::info!("Cleanup task started (interval: {}s)", interval_secs);

        let mut timer = interval(Duration::from_secs(interval_secs));

        loop {
            timer.tick().await;
            run_cleanup(&relay);
        }
    })
}

/// One housekeeping pass.
fn run_cleanup(relay: &SignalingRelay) {
    let limits = relay.rate_limits();
    let before = limits.connection_keys_count() + limits.message_keys_count();
    limits.shrink();
    let after = limits.connection_keys_count() + limits.message_keys_count();

    if before > after {
        tracing::info!("Cleanup: evicted {} idle rate limiter keys", before - after);
    }
    tracing::debug!(
        registered = relay.registered_count(),
        pending = relay.pending_count(),
        connections = relay.open_sessions(),
        "Cleanup pass complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn cleanup_pass_keeps_relay_state() {
        let relay = SignalingRelay::new(Config::default());
        let (channel, _rx) = relay.open_channel();
        relay.register(signal_types::ClientId::from("A"), &channel);
        let _ = relay.rate_limits().check_message(channel.id());

        run_cleanup(&relay);

        assert_eq!(relay.registered_count(), 1);
    }

    #[tokio::test]
    async fn cleanup_task_disabled() {
        let relay = Arc::new(SignalingRelay::new(Config::default()));
        let config = CleanupConfig {
            interval_secs: 1,
            enabled: false,
        };

        let handle = spawn_cleanup_task(relay, config);

        // Task should complete immediately when disabled
        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("Task should complete when disabled")
            .expect("Task should not panic");
    }

    #[tokio::test]
    async fn cleanup_task_runs_until_aborted() {
        let relay = Arc::new(SignalingRelay::new(Config::default()));
        let handle = spawn_cleanup_task(
            relay,
            CleanupConfig {
                interval_secs: 1,
                enabled: true,
            },
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
