//! Periodic sweep of idle and released tasks

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::registry::TaskRegistry;

/// Spawn the reaper; it stops when `shutdown` is cancelled
pub fn spawn_reaper(
    registry: TaskRegistry,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_ms = period.as_millis() as u64, "Task reaper started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let reaped = registry.reap(Instant::now()).await;
                    if !reaped.is_empty() {
                        debug!(count = reaped.len(), "Reaper removed tasks");
                    }
                }
            }
        }

        info!("Task reaper stopped");
    })
}
