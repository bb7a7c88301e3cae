//! The coordinator: command plumbing, queries and manager failover.
//!
//! Formation and update live in `formation.rs`, draining in `drain.rs`;
//! both are further `impl` blocks on [`Coordinator`].

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};

use swarm_core::{
    decode_json, decode_json_lines, split_host, AddressError, NodeInfo, NodeStatus, Role,
    SwarmCommand, Task,
};
use swarm_exec::{ExecError, Transport};

use crate::config::CoordinatorConfig;
use crate::error::{ClusterError, ClusterResult};

/// Drives cluster protocols through an exclusively owned transport.
pub struct Coordinator<T> {
    pub(crate) transport: T,
    pub(crate) config: CoordinatorConfig,
    pub(crate) rng: StdRng,
}

/// Outcome of trying one remote manager during failover.
#[derive(Debug)]
enum Candidate {
    Switched(String),
    Malformed { addr: String, error: AddressError },
    SwitchFailed { host: String, error: ClusterError },
}

impl<T: Transport> Coordinator<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, CoordinatorConfig::default())
    }

    pub fn with_config(transport: T, config: CoordinatorConfig) -> Self {
        Self {
            transport,
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Make random leader selection reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Address of the node commands currently run on.
    pub fn target(&self) -> Option<&str> {
        self.transport.target()
    }

    pub(crate) fn target_name(&self) -> String {
        self.transport.target().unwrap_or("<none>").to_string()
    }

    /// Switch to a new node to perform operations on.
    pub async fn switch_node(&mut self, address: &str) -> ClusterResult<()> {
        self.transport
            .switch(address)
            .await
            .map_err(|source| ClusterError::Transport {
                address: address.to_string(),
                source,
            })
    }

    /// Run one command on the current target and return its stdout.
    pub(crate) async fn exec(&mut self, command: &SwarmCommand) -> ClusterResult<String> {
        let target = self.target_name();
        let line = command.render();
        if command.is_mutating() {
            info!(node = %target, command = %line, "running command");
        } else {
            debug!(node = %target, command = %line, "running command");
        }

        match self.transport.run(&line).await {
            Ok(output) => Ok(output.stdout),
            Err(source) if source.is_connectivity() => {
                error!(node = %target, verb = command.verb(), error = %source, "node not reachable");
                Err(ClusterError::Transport {
                    address: target,
                    source,
                })
            }
            Err(source) => {
                if let ExecError::Failed { stdout, stderr, code, .. } = &source {
                    error!(node = %target, verb = command.verb(), ?code, %stdout, %stderr, "command failed");
                } else {
                    error!(node = %target, verb = command.verb(), error = %source, "command could not run");
                }
                Err(ClusterError::Execution {
                    target,
                    verb: command.verb(),
                    source,
                })
            }
        }
    }

    /// Information about the current node.
    pub async fn get_info(&mut self) -> ClusterResult<NodeInfo> {
        let output = self.exec(&SwarmCommand::Info).await?;
        decode_json("info", &output).map_err(|e| ClusterError::decode(&self.target_name(), e))
    }

    /// All nodes in the cluster, as seen from a manager.
    pub async fn get_nodes(&mut self) -> ClusterResult<Vec<NodeStatus>> {
        self.ensure_manager().await?;
        self.list_nodes().await
    }

    /// Information from every manager the current node knows about.
    ///
    /// Visits each manager in turn; the target is left on the last one.
    pub async fn get_managers(&mut self) -> ClusterResult<Vec<NodeInfo>> {
        let node = self.get_info().await?;

        let mut managers = Vec::new();
        for addr in node.remote_manager_addrs() {
            let host = split_host(addr).map_err(|e| ClusterError::Transport {
                address: addr.to_string(),
                source: ExecError::InvalidAddress(e),
            })?;
            self.switch_node(&host).await?;
            managers.push(self.get_info().await?);
        }

        Ok(managers)
    }

    /// The current join token for `role`. The current node must be a manager.
    pub async fn join_token(&mut self, role: Role) -> ClusterResult<String> {
        let output = self.exec(&SwarmCommand::JoinToken { role }).await?;
        let token = output.trim();
        if token.is_empty() {
            return Err(ClusterError::Deserialization {
                target: self.target_name(),
                what: "join-token",
                reason: format!("empty {role} token"),
            });
        }
        Ok(token.to_string())
    }

    /// Make sure the current target is an active manager.
    ///
    /// If it is not, switch to the first remote manager it knows about
    /// that accepts the switch. The candidate is trusted without asking
    /// it again whether it is a manager.
    pub async fn ensure_manager(&mut self) -> ClusterResult<()> {
        let node = self.get_info().await?;
        self.failover_from(&node).await
    }

    pub(crate) async fn failover_from(&mut self, node: &NodeInfo) -> ClusterResult<()> {
        if node.is_manager() {
            debug!(node = %self.target_name(), "current node is an active manager");
            return Ok(());
        }

        for addr in node.remote_manager_addrs() {
            match self.try_candidate(addr).await {
                Candidate::Switched(host) => {
                    info!(manager = %host, "switched to remote manager");
                    return Ok(());
                }
                Candidate::Malformed { addr, error } => {
                    warn!(%addr, %error, "error parsing remote manager address (trying next manager)");
                }
                Candidate::SwitchFailed { host, error } => {
                    warn!(manager = %host, %error, "error switching to remote manager (trying next manager)");
                }
            }
        }

        Err(ClusterError::NoSuitableManager)
    }

    async fn try_candidate(&mut self, addr: &str) -> Candidate {
        let host = match split_host(addr) {
            Ok(host) => host,
            Err(error) => {
                return Candidate::Malformed {
                    addr: addr.to_string(),
                    error,
                }
            }
        };

        match self.switch_node(&host).await {
            Ok(()) => Candidate::Switched(host),
            Err(error) => Candidate::SwitchFailed { host, error },
        }
    }

    /// `docker node ls` on the current target, without failover.
    pub(crate) async fn list_nodes(&mut self) -> ClusterResult<Vec<NodeStatus>> {
        let output = self.exec(&SwarmCommand::ListNodes).await?;
        decode_json_lines("node ls", &output).map_err(|e| ClusterError::decode(&self.target_name(), e))
    }

    /// `docker node ps <node>` on the current target.
    pub(crate) async fn list_tasks(&mut self, node: &str) -> ClusterResult<Vec<Task>> {
        let output = self.exec(&SwarmCommand::list_tasks(node)).await?;
        decode_json_lines("node ps", &output).map_err(|e| ClusterError::decode(&self.target_name(), e))
    }
}
