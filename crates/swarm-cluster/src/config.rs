//! Coordinator tuning.

use std::time::Duration;

use swarm_core::commands::SWARM_PORT;

/// Timing and port settings for a [`Coordinator`](crate::Coordinator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Interval between task-list polls while a node drains.
    pub drain_poll_interval: Duration,
    /// Per-node bound on waiting for a drain to finish.
    pub drain_timeout: Duration,
    /// Port joining nodes use to reach a manager.
    pub swarm_port: u16,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            drain_poll_interval: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(10 * 60),
            swarm_port: SWARM_PORT,
        }
    }
}

impl CoordinatorConfig {
    pub fn with_drain_poll_interval(mut self, interval: Duration) -> Self {
        self.drain_poll_interval = interval;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_swarm_port(mut self, port: u16) -> Self {
        self.swarm_port = port;
        self
    }
}
