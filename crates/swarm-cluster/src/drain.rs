//! Drain protocol.
//!
//! Each node is set to `availability=drain` and then polled until every
//! task pinned to it is terminal. Nodes are drained one at a time and the
//! first failure aborts the rest.
//!
//! ```text
//! Requested ──(node update)──► Draining ──(all tasks terminal)──► Drained
//!                                  │
//!                                  └──(deadline)──► TimedOut
//! ```

use std::fmt;

use tokio::time::{interval_at, sleep_until, timeout_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use swarm_core::{all_terminal, Availability, SwarmCommand};
use swarm_exec::Transport;

use crate::coordinator::Coordinator;
use crate::error::{ClusterError, ClusterResult};

/// Per-node drain progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    Requested,
    Draining,
    Drained,
    TimedOut,
}

impl fmt::Display for DrainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DrainState::Requested => "requested",
            DrainState::Draining => "draining",
            DrainState::Drained => "drained",
            DrainState::TimedOut => "timed out",
        })
    }
}

fn transition(node: &str, state: &mut DrainState, next: DrainState) {
    debug!(%node, from = %state, to = %next, "drain state changed");
    *state = next;
}

fn timed_out(node: &str, state: &mut DrainState, started: Instant) -> ClusterError {
    let elapsed = started.elapsed();
    transition(node, state, DrainState::TimedOut);
    warn!(%node, ?elapsed, "gave up waiting for node to drain");
    ClusterError::DrainTimeout {
        node: node.to_string(),
        elapsed,
    }
}

impl<T: Transport> Coordinator<T> {
    /// Drain each of `nodes` in turn from an active manager.
    ///
    /// Nodes are orchestrator ids or hostnames, as `docker node` accepts.
    pub async fn drain_nodes(&mut self, nodes: &[String]) -> ClusterResult<()> {
        self.ensure_manager().await?;

        for node in nodes {
            self.drain_node(node).await.map_err(|source| ClusterError::Drain {
                node: node.clone(),
                source: Box::new(source),
            })?;
        }

        Ok(())
    }

    async fn drain_node(&mut self, node: &str) -> ClusterResult<()> {
        let period = self.config.drain_poll_interval;
        let timeout = self.config.drain_timeout;
        let mut state = DrainState::Requested;

        self.exec(&SwarmCommand::set_availability(node, Availability::Drain))
            .await?;
        let started = Instant::now();
        transition(node, &mut state, DrainState::Draining);

        let deadline = sleep_until(started + timeout);
        tokio::pin!(deadline);
        let mut ticker = interval_at(started + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = &mut deadline => return Err(timed_out(node, &mut state, started)),

                _ = ticker.tick() => {
                    // A hung poll must not outlive the deadline.
                    let Ok(poll) = timeout_at(started + timeout, self.list_tasks(node)).await else {
                        return Err(timed_out(node, &mut state, started));
                    };
                    match poll {
                        Ok(tasks) if all_terminal(&tasks) => {
                            transition(node, &mut state, DrainState::Drained);
                            info!(%node, elapsed = ?started.elapsed(), "successfully drained");
                            return Ok(());
                        }
                        Ok(tasks) => {
                            let running = tasks.iter().filter(|t| !t.is_terminal()).count();
                            info!(%node, running, elapsed = ?started.elapsed(), "still waiting for node to drain");
                        }
                        Err(error) => {
                            warn!(%node, %error, "error polling node tasks (will retry)");
                        }
                    }
                }
            }
        }
    }
}
