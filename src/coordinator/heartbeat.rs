//! Periodic liveness scanning for registered agents.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::cancel::CancelFlag;
use crate::error::CoreResult;

use super::TaskCoordinator;

/// Drives [`TaskCoordinator::expire_stale_agents`] on a fixed interval.
///
/// An agent silent past the configured timeout is marked disconnected
/// and its in-flight tasks return to the front of the queue; the agent
/// rejoins by heartbeating again. The monitor runs until its
/// cancellation flag is raised.
pub struct HeartbeatMonitor {
    coordinator: Arc<TaskCoordinator>,
    interval: Duration,
    cancel: CancelFlag,
}

impl HeartbeatMonitor {
    /// Build a monitor over a coordinator, taking the scan interval from
    /// the coordinator's configuration.
    pub fn new(coordinator: Arc<TaskCoordinator>) -> Self {
        let interval = Duration::from_millis(coordinator.config().heartbeat_interval_ms.max(1));
        Self {
            coordinator,
            interval,
            cancel: CancelFlag::new(),
        }
    }

    /// Install a shared cancellation flag; raising it stops [`run`](Self::run).
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Record a heartbeat from an agent.
    pub fn heartbeat(&self, agent_id: &str) -> CoreResult<()> {
        debug!(agent = %agent_id, "heartbeat received");
        self.coordinator.record_heartbeat(agent_id)
    }

    /// Run one liveness scan against the given instant. Returns how many
    /// agents were marked disconnected.
    pub async fn check(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        let expired = self.coordinator.expire_stale_agents(now).await?;
        if expired > 0 {
            // Orphaned tasks are back in the queue; hand them out.
            self.coordinator.distribute_tasks().await?;
        }
        Ok(expired)
    }

    /// Scan on the configured interval until cancelled.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(interval_ms = self.interval.as_millis() as u64, "heartbeat monitor started");
        loop {
            ticker.tick().await;
            if self.cancel.is_cancelled() {
                break;
            }
            match self.check(Utc::now()).await {
                Ok(_) => {}
                Err(e) if e.is_cancelled() => break,
                Err(e) => warn!(error = %e, "heartbeat scan failed"),
            }
        }
        info!("heartbeat monitor stopped");
    }
}
