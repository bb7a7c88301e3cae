//! Domain types for swarmgrid.
//!
//! `MemberNode` is what the operator declares in a Clusterfile. The rest
//! are typed views over the JSON that `docker info`, `docker node ls` and
//! `docker node ps` print; they are decoded fresh from every query and
//! never cached, since quorum membership can change between calls.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Manager counts accepted for quorum decisions.
pub const QUORUM_SIZES: [usize; 2] = [3, 5];

/// Whether `managers` is an acceptable manager-set cardinality.
pub fn is_valid_quorum(managers: usize) -> bool {
    QUORUM_SIZES.contains(&managers)
}

// ── Roles ──────────────────────────────────────────────────────────

/// Role a member plays in the swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Manager,
    Worker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Manager => "manager",
            Role::Worker => "worker",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown role {0:?} (expected \"manager\" or \"worker\")")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manager" => Ok(Role::Manager),
            "worker" => Ok(Role::Worker),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Scheduling availability of a swarm node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Active,
    Pause,
    Drain,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Active => "active",
            Availability::Pause => "pause",
            Availability::Drain => "drain",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Declared members ──────────────────────────────────────────────

/// A machine the operator wants in the cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberNode {
    pub hostname: String,
    /// Address the coordinator reaches the machine on.
    pub public_address: String,
    /// Address advertised to the rest of the swarm.
    pub private_address: String,
    pub role: Role,
    /// Node labels. An empty value is applied as a bare key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl MemberNode {
    pub fn new(
        hostname: impl Into<String>,
        public_address: impl Into<String>,
        private_address: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            public_address: public_address.into(),
            private_address: private_address.into(),
            role,
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }
}

/// Members of `nodes` with the given role, in declaration order.
pub fn filter_by_role(nodes: &[MemberNode], role: Role) -> Vec<&MemberNode> {
    nodes.iter().filter(|n| n.role == role).collect()
}

// ── docker info ───────────────────────────────────────────────────

/// Output of `docker info` for one node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeInfo {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Swarm", default, deserialize_with = "null_as_default")]
    pub swarm: SwarmInfo,
}

/// The `Swarm` section of `docker info`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SwarmInfo {
    #[serde(rename = "NodeID", default)]
    pub node_id: String,
    #[serde(default)]
    pub node_addr: String,
    /// `inactive`, `pending`, `active`, `error` or `locked`.
    #[serde(default)]
    pub local_node_state: String,
    /// True when this node is a manager that can serve control requests.
    #[serde(default)]
    pub control_available: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub remote_managers: Vec<RemoteManager>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cluster: ClusterRef,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterRef {
    #[serde(rename = "ID", default)]
    pub id: String,
}

/// A manager this node knows about, as `host:port`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RemoteManager {
    #[serde(rename = "NodeID", default)]
    pub node_id: String,
    #[serde(rename = "Addr", default)]
    pub addr: String,
}

impl NodeInfo {
    /// Whether this node is currently an active quorum manager.
    pub fn is_manager(&self) -> bool {
        self.swarm.control_available
    }

    /// Cluster ID, empty when the node is not part of a swarm.
    pub fn cluster_id(&self) -> &str {
        &self.swarm.cluster.id
    }

    pub fn node_id(&self) -> &str {
        &self.swarm.node_id
    }

    pub fn remote_manager_addrs(&self) -> impl Iterator<Item = &str> {
        self.swarm.remote_managers.iter().map(|m| m.addr.as_str())
    }
}

// ── docker node ls ────────────────────────────────────────────────

/// One row of `docker node ls`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct NodeStatus {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(default)]
    pub hostname: String,
    /// `Ready`, `Down`, `Unknown`, `Disconnected`.
    #[serde(default)]
    pub status: String,
    /// `Active`, `Pause` or `Drain`.
    #[serde(default)]
    pub availability: String,
    /// `Leader`, `Reachable`, `Unreachable`, or empty for workers.
    #[serde(default)]
    pub manager_status: String,
    #[serde(default)]
    pub engine_version: String,
    #[serde(rename = "Self", default)]
    pub is_self: bool,
}

impl NodeStatus {
    pub fn is_manager(&self) -> bool {
        !self.manager_status.is_empty()
    }

    pub fn is_leader(&self) -> bool {
        self.manager_status.eq_ignore_ascii_case("leader")
    }

    pub fn role(&self) -> Role {
        if self.is_manager() {
            Role::Manager
        } else {
            Role::Worker
        }
    }
}

// ── docker node ps ────────────────────────────────────────────────

/// Current-state prefixes that mean a task will not run again.
const TERMINAL_STATES: &[&str] = &[
    "shutdown", "complete", "failed", "rejected", "orphaned", "remove",
];

/// One row of `docker node ps`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Task {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub desired_state: String,
    /// e.g. `Running 3 minutes ago`, `Shutdown 2 seconds ago`.
    #[serde(default)]
    pub current_state: String,
    #[serde(default)]
    pub error: String,
}

impl Task {
    /// Whether the task's current state is terminal.
    pub fn is_terminal(&self) -> bool {
        let state = self
            .current_state
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        TERMINAL_STATES.contains(&state.as_str())
    }
}

/// A node is drained once every task pinned to it is terminal.
pub fn all_terminal(tasks: &[Task]) -> bool {
    tasks.iter().all(Task::is_terminal)
}

/// Docker prints `null` for empty collections in several places.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
