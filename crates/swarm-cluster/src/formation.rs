//! Cluster formation and incremental membership updates.
//!
//! ```text
//! create_swarm                         update_swarm
//!   quorum check                         quorum check
//!   switch → random manager (leader)     ensure_manager, info on manager
//!   info → must not be in a cluster      cluster id must exist, node ls
//!   swarm init, label leader             diff desired vs roster by hostname
//!   fetch manager + worker tokens        pick join target among old managers
//!   join managers, then workers          fetch tokens, join new members
//!   switch → leader                      switch → join target
//! ```
//!
//! Nothing is rolled back. A failed join leaves the members admitted so
//! far in place and the error names the node, leader and cluster.

use std::collections::HashSet;
use std::fmt;

use rand::seq::SliceRandom;
use tracing::{debug, info};

use swarm_core::{filter_by_role, is_valid_quorum, MemberNode, Role, SwarmCommand};
use swarm_exec::Transport;

use crate::coordinator::Coordinator;
use crate::error::{ClusterError, ClusterResult};

/// Join secrets for both roles, fetched from a manager.
#[derive(Clone, PartialEq, Eq)]
pub struct JoinTokens {
    pub manager: String,
    pub worker: String,
}

impl JoinTokens {
    pub fn for_role(&self, role: Role) -> &str {
        match role {
            Role::Manager => &self.manager,
            Role::Worker => &self.worker,
        }
    }
}

impl fmt::Debug for JoinTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinTokens")
            .field("manager", &"<redacted>")
            .field("worker", &"<redacted>")
            .finish()
    }
}

fn check_quorum(nodes: &[MemberNode]) -> ClusterResult<Vec<&MemberNode>> {
    let managers = filter_by_role(nodes, Role::Manager);
    if !is_valid_quorum(managers.len()) {
        return Err(ClusterError::InvalidQuorumSize(managers.len()));
    }
    Ok(managers)
}

/// Members whose hostname is not in `present`.
fn absent_from<'a>(members: &[&'a MemberNode], present: &HashSet<&str>) -> Vec<&'a MemberNode> {
    members
        .iter()
        .copied()
        .filter(|m| !present.contains(m.hostname.as_str()))
        .collect()
}

impl<T: Transport> Coordinator<T> {
    /// Form a new cluster from `nodes` and return its id.
    ///
    /// The target is left on the leader.
    pub async fn create_swarm(&mut self, nodes: &[MemberNode]) -> ClusterResult<String> {
        let managers = check_quorum(nodes)?;
        let workers = filter_by_role(nodes, Role::Worker);

        let leader = *managers
            .choose(&mut self.rng)
            .ok_or(ClusterError::InvalidQuorumSize(managers.len()))?;

        info!(
            leader = %leader.hostname,
            managers = managers.len(),
            workers = workers.len(),
            "forming swarm cluster"
        );

        self.switch_node(&leader.public_address).await?;

        let info = self.get_info().await?;
        if !info.cluster_id().is_empty() {
            return Err(ClusterError::ClusterAlreadyExists(info.cluster_id().to_string()));
        }

        self.exec(&SwarmCommand::init(&leader.private_address)).await?;
        self.label_member(leader, &leader.public_address).await?;

        let cluster_id = self.get_info().await?.cluster_id().to_string();
        info!(%cluster_id, leader = %leader.hostname, "swarm cluster initialized");

        let tokens = self.fetch_tokens().await?;

        for manager in managers.iter().filter(|m| m.hostname != leader.hostname) {
            self.admit(manager, &tokens, leader, &cluster_id).await?;
        }
        for worker in &workers {
            self.admit(worker, &tokens, leader, &cluster_id).await?;
        }

        self.switch_node(&leader.public_address).await?;
        info!(%cluster_id, nodes = nodes.len(), "swarm cluster formed");
        Ok(cluster_id)
    }

    /// Join every member of `nodes` missing from the current cluster.
    ///
    /// Returns the hostnames that were added, managers first. Members
    /// already in the roster are left untouched.
    pub async fn update_swarm(&mut self, nodes: &[MemberNode]) -> ClusterResult<Vec<String>> {
        let managers = check_quorum(nodes)?;
        let workers = filter_by_role(nodes, Role::Worker);

        // Workers do not report the cluster id; ask a manager.
        let mut info = self.get_info().await?;
        if !info.is_manager() {
            if info.remote_manager_addrs().next().is_none() {
                return Err(ClusterError::NoExistingCluster);
            }
            self.failover_from(&info).await?;
            info = self.get_info().await?;
        }
        let cluster_id = info.cluster_id().to_string();
        if cluster_id.is_empty() {
            return Err(ClusterError::NoExistingCluster);
        }

        let roster = self.list_nodes().await?;
        let present: HashSet<&str> = roster.iter().map(|n| n.hostname.as_str()).collect();

        let new_managers = absent_from(&managers, &present);
        let new_workers = absent_from(&workers, &present);

        if new_managers.is_empty() && new_workers.is_empty() {
            info!(%cluster_id, "every member already joined");
            return Ok(Vec::new());
        }

        let existing: Vec<&MemberNode> = managers
            .iter()
            .copied()
            .filter(|m| present.contains(m.hostname.as_str()))
            .collect();
        let join_target = *existing
            .choose(&mut self.rng)
            .ok_or(ClusterError::NoSuitableManager)?;

        info!(
            %cluster_id,
            join_target = %join_target.hostname,
            new_managers = new_managers.len(),
            new_workers = new_workers.len(),
            "updating swarm cluster"
        );

        let tokens = self.fetch_tokens().await?;

        let mut added = Vec::with_capacity(new_managers.len() + new_workers.len());
        for member in new_managers.into_iter().chain(new_workers) {
            self.admit(member, &tokens, join_target, &cluster_id).await?;
            added.push(member.hostname.clone());
        }

        self.switch_node(&join_target.public_address).await?;
        Ok(added)
    }

    /// Fetch both join tokens from the current target.
    pub async fn fetch_tokens(&mut self) -> ClusterResult<JoinTokens> {
        let manager = self
            .join_token(Role::Manager)
            .await
            .map_err(ClusterError::during("getting manager join token"))?;
        let worker = self
            .join_token(Role::Worker)
            .await
            .map_err(ClusterError::during("getting worker join token"))?;
        Ok(JoinTokens { manager, worker })
    }

    async fn admit(
        &mut self,
        member: &MemberNode,
        tokens: &JoinTokens,
        join_target: &MemberNode,
        cluster_id: &str,
    ) -> ClusterResult<()> {
        self.join_member(member, tokens, join_target)
            .await
            .map_err(|source| ClusterError::Join {
                role: member.role,
                node: member.public_address.clone(),
                leader: join_target.public_address.clone(),
                cluster_id: cluster_id.to_string(),
                source: Box::new(source),
            })
    }

    async fn join_member(
        &mut self,
        member: &MemberNode,
        tokens: &JoinTokens,
        join_target: &MemberNode,
    ) -> ClusterResult<()> {
        self.switch_node(&member.public_address).await?;
        self.exec(&SwarmCommand::join(
            &member.private_address,
            tokens.for_role(member.role),
            &join_target.private_address,
            self.config.swarm_port,
        ))
        .await?;
        info!(node = %member.hostname, role = %member.role, "joined swarm cluster");

        self.label_member(member, &join_target.public_address).await
    }

    /// Apply `member`'s labels through the manager at `manager_addr`.
    async fn label_member(&mut self, member: &MemberNode, manager_addr: &str) -> ClusterResult<()> {
        if member.labels.is_empty() {
            return Ok(());
        }

        self.apply_labels(member, manager_addr)
            .await
            .map_err(|source| ClusterError::Label {
                node: member.hostname.clone(),
                source: Box::new(source),
            })
    }

    /// Learns the member's node id on the member itself, then issues a
    /// single `node update` on the manager. Leaves the target on the manager.
    async fn apply_labels(&mut self, member: &MemberNode, manager_addr: &str) -> ClusterResult<()> {
        self.switch_node(&member.public_address).await?;
        let info = self.get_info().await?;
        let node_id = info.node_id();
        if node_id.is_empty() {
            return Err(ClusterError::Deserialization {
                target: member.public_address.clone(),
                what: "info",
                reason: "node reports no swarm node id".to_string(),
            });
        }

        self.switch_node(manager_addr).await?;
        self.exec(&SwarmCommand::add_labels(node_id, &member.labels)).await?;
        debug!(node = %member.hostname, %node_id, labels = member.labels.len(), "applied node labels");
        Ok(())
    }
}
