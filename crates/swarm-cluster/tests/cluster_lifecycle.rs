//! Cluster lifecycle integration tests.
//!
//! Drives formation and incremental updates against `FakeSwarm`, an
//! in-memory model of a set of Docker hosts that answers the coordinator's
//! command lines the way the real daemons would. Everything runs through
//! `MockTransport`, so the call log can be checked as well as the final
//! cluster state.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use swarm_cluster::{ClusterError, Coordinator};
use swarm_core::commands::SWARM_PORT;
use swarm_core::{MemberNode, Role};
use swarm_exec::{ExecError, ExecResult, MockLog, MockTransport};

const CLUSTER_ID: &str = "q7w8e9r0t1y2";
const NOT_A_MANAGER: &str = "Error response from daemon: This node is not a swarm manager.";

// ── Fake swarm ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct FakeHost {
    hostname: String,
    public_address: String,
    private_address: String,
    role: Option<Role>,
    labels: Vec<String>,
}

impl FakeHost {
    fn node_id(&self) -> String {
        format!("id-{}", self.hostname)
    }
}

#[derive(Debug, Default)]
struct FakeState {
    hosts: Vec<FakeHost>,
    cluster_id: Option<String>,
}

impl FakeState {
    fn host_at(&self, address: &str) -> Option<usize> {
        self.hosts
            .iter()
            .position(|h| h.public_address == address || h.private_address == address)
    }

    fn host_named(&self, node: &str) -> Option<usize> {
        self.hosts
            .iter()
            .position(|h| h.hostname == node || h.node_id() == node)
    }

    fn require_manager(&self, idx: usize, command: &str) -> ExecResult<()> {
        if self.hosts[idx].role == Some(Role::Manager) {
            Ok(())
        } else {
            Err(ExecError::failed(command, 1, NOT_A_MANAGER))
        }
    }

    fn info(&self, idx: usize) -> String {
        let host = &self.hosts[idx];
        let Some(role) = host.role else {
            return json!({
                "ID": format!("engine-{}", host.hostname),
                "Name": host.hostname,
                "Swarm": {
                    "NodeID": "",
                    "LocalNodeState": "inactive",
                    "ControlAvailable": false,
                    "RemoteManagers": null,
                    "Cluster": null,
                }
            })
            .to_string();
        };

        let managers: Vec<_> = self
            .hosts
            .iter()
            .filter(|h| h.role == Some(Role::Manager))
            .map(|h| json!({ "NodeID": h.node_id(), "Addr": format!("{}:{SWARM_PORT}", h.private_address) }))
            .collect();

        // Only managers report the cluster they belong to.
        let cluster = match role {
            Role::Manager => json!({ "ID": self.cluster_id.clone().unwrap_or_default() }),
            Role::Worker => Value::Null,
        };

        json!({
            "ID": format!("engine-{}", host.hostname),
            "Name": host.hostname,
            "Swarm": {
                "NodeID": host.node_id(),
                "NodeAddr": host.private_address,
                "LocalNodeState": "active",
                "ControlAvailable": role == Role::Manager,
                "RemoteManagers": managers,
                "Cluster": cluster,
            }
        })
        .to_string()
    }

    fn roster(&self) -> String {
        let mut leader_seen = false;
        self.hosts
            .iter()
            .filter_map(|h| {
                let role = h.role?;
                let status = match role {
                    Role::Manager if !leader_seen => {
                        leader_seen = true;
                        "Leader"
                    }
                    Role::Manager => "Reachable",
                    Role::Worker => "",
                };
                Some(
                    json!({
                        "ID": h.node_id(),
                        "Hostname": h.hostname,
                        "Status": "Ready",
                        "Availability": "Active",
                        "ManagerStatus": status,
                    })
                    .to_string(),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn handle(&mut self, target: &str, command: &str) -> ExecResult<String> {
        let Some(idx) = self.host_at(target) else {
            return Err(ExecError::failed(command, 255, "ssh: connect to host: No route to host"));
        };
        let args: Vec<&str> = command.split_whitespace().collect();

        match args.as_slice() {
            ["docker", "info", ..] => Ok(self.info(idx)),
            ["docker", "node", "ls", ..] => {
                self.require_manager(idx, command)?;
                Ok(self.roster())
            }
            ["docker", "node", "ps", .., _node] => {
                self.require_manager(idx, command)?;
                Ok(String::new())
            }
            ["docker", "swarm", "init", ..] => {
                if self.cluster_id.is_some() {
                    return Err(ExecError::failed(
                        command,
                        1,
                        "Error response from daemon: This node is already part of a swarm.",
                    ));
                }
                self.cluster_id = Some(CLUSTER_ID.to_string());
                self.hosts[idx].role = Some(Role::Manager);
                Ok("Swarm initialized".to_string())
            }
            ["docker", "swarm", "join-token", "-q", role] => {
                self.require_manager(idx, command)?;
                Ok(format!("SWMTKN-1-{role}\n"))
            }
            ["docker", "swarm", "join", .., "--token", token, manager] => {
                if self.hosts[idx].role.is_some() {
                    return Err(ExecError::failed(
                        command,
                        1,
                        "Error response from daemon: This node is already part of a swarm.",
                    ));
                }
                let (manager_addr, _) = manager.split_once(':').unwrap_or((*manager, ""));
                let reachable = self
                    .host_at(manager_addr)
                    .is_some_and(|m| self.hosts[m].role == Some(Role::Manager));
                if !reachable {
                    return Err(ExecError::failed(command, 1, "Error response from daemon: Timeout was reached"));
                }
                let role = match *token {
                    "SWMTKN-1-manager" => Role::Manager,
                    "SWMTKN-1-worker" => Role::Worker,
                    _ => return Err(ExecError::failed(command, 1, "invalid join token")),
                };
                self.hosts[idx].role = Some(role);
                Ok(format!("This node joined a swarm as a {role}."))
            }
            ["docker", "node", "update", flags @ .., node] => {
                self.require_manager(idx, command)?;
                let Some(target_idx) = self.host_named(node) else {
                    return Err(ExecError::failed(command, 1, &format!("Error: No such node: {node}")));
                };
                let mut flags = flags.iter();
                while let Some(flag) = flags.next() {
                    if *flag == "--label-add" {
                        if let Some(label) = flags.next() {
                            self.hosts[target_idx].labels.push(label.to_string());
                        }
                    }
                }
                Ok(format!("{node}\n"))
            }
            _ => Err(ExecError::failed(command, 127, "unknown command")),
        }
    }
}

/// A shared, inspectable fake of the Docker hosts behind a transport.
#[derive(Clone)]
struct FakeSwarm {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSwarm {
    fn new(members: &[MemberNode]) -> Self {
        let hosts = members
            .iter()
            .map(|m| FakeHost {
                hostname: m.hostname.clone(),
                public_address: m.public_address.clone(),
                private_address: m.private_address.clone(),
                role: None,
                labels: Vec::new(),
            })
            .collect();
        Self {
            state: Arc::new(Mutex::new(FakeState {
                hosts,
                cluster_id: None,
            })),
        }
    }

    /// Put the named hosts in an existing cluster with their declared roles.
    fn with_cluster(self, members: &[&MemberNode]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.cluster_id = Some(CLUSTER_ID.to_string());
            for member in members {
                let idx = state.host_named(&member.hostname).unwrap();
                state.hosts[idx].role = Some(member.role);
            }
        }
        self
    }

    fn transport(&self) -> MockTransport {
        let state = self.state.clone();
        MockTransport::new(move |target, command| state.lock().unwrap().handle(target, command))
    }

    fn host(&self, hostname: &str) -> FakeHost {
        let state = self.state.lock().unwrap();
        let idx = state.host_named(hostname).unwrap();
        state.hosts[idx].clone()
    }

    /// The host answering on a public or private address.
    fn host_at(&self, address: &str) -> FakeHost {
        let state = self.state.lock().unwrap();
        let idx = state.host_at(address).unwrap();
        state.hosts[idx].clone()
    }
}

// ── Fixtures ───────────────────────────────────────────────────────

fn member(n: u8, role: Role) -> MemberNode {
    let prefix = match role {
        Role::Manager => "mgr",
        Role::Worker => "wrk",
    };
    let host = match role {
        Role::Manager => n,
        Role::Worker => 100 + n,
    };
    MemberNode::new(
        format!("{prefix}-{n}"),
        format!("203.0.113.{host}"),
        format!("10.0.0.{host}"),
        role,
    )
}

fn cluster(managers: u8, workers: u8) -> Vec<MemberNode> {
    (1..=managers)
        .map(|n| member(n, Role::Manager))
        .chain((1..=workers).map(|n| member(n, Role::Worker)))
        .collect()
}

fn roles_by_target(log: &MockLog, swarm: &FakeSwarm, prefix: &str) -> Vec<Role> {
    let state = swarm.state.lock().unwrap();
    log.runs_starting_with(prefix)
        .iter()
        .map(|(target, _)| {
            let idx = state.host_at(target).unwrap();
            state.hosts[idx].role.unwrap()
        })
        .collect()
}

// ── Formation ──────────────────────────────────────────────────────

#[tokio::test]
async fn create_forms_cluster_managers_before_workers() {
    let mut nodes = cluster(3, 2);
    nodes[0] = nodes[0].clone().with_label("zone", "a");
    nodes[3] = nodes[3].clone().with_label("gpu", "").with_label("zone", "b");

    let swarm = FakeSwarm::new(&nodes);
    let transport = swarm.transport();
    let log = transport.log();
    let mut coordinator = Coordinator::new(transport).with_seed(7);

    let cluster_id = coordinator.create_swarm(&nodes).await.unwrap();
    assert_eq!(cluster_id, CLUSTER_ID);

    let inits = log.runs_starting_with("docker swarm init");
    assert_eq!(inits.len(), 1);
    let leader = inits[0].0.clone();

    // "docker swarm join " excludes join-token queries.
    let joins = log.runs_starting_with("docker swarm join ");
    assert_eq!(joins.len(), 4);
    assert_eq!(
        roles_by_target(&log, &swarm, "docker swarm join "),
        vec![Role::Manager, Role::Manager, Role::Worker, Role::Worker]
    );
    let leader_private = format!("{}:{SWARM_PORT}", swarm.host_at(&leader).private_address);
    assert!(joins.iter().all(|(_, command)| command.ends_with(&leader_private)));
    assert!(joins.iter().all(|(target, _)| *target != leader));

    let updates = log.runs_starting_with("docker node update");
    assert_eq!(updates.len(), 2);
    assert!(updates.iter().all(|(target, _)| *target == leader));

    assert_eq!(swarm.host("mgr-1").labels, vec!["zone=a"]);
    assert_eq!(swarm.host("wrk-1").labels, vec!["gpu", "zone=b"]);
    assert!(swarm.host("wrk-2").labels.is_empty());

    for node in &nodes {
        assert_eq!(swarm.host(&node.hostname).role, Some(node.role));
    }
    assert_eq!(coordinator.target(), Some(leader.as_str()));
}

#[tokio::test]
async fn create_with_five_managers() {
    let nodes = cluster(5, 0);
    let swarm = FakeSwarm::new(&nodes);
    let transport = swarm.transport();
    let log = transport.log();
    let mut coordinator = Coordinator::new(transport);

    coordinator.create_swarm(&nodes).await.unwrap();

    assert_eq!(log.runs_starting_with("docker swarm join ").len(), 4);
    assert!(log.runs_starting_with("docker node update").is_empty());
}

#[tokio::test]
async fn create_rejects_existing_cluster() {
    let nodes = cluster(3, 1);
    let managers: Vec<&MemberNode> = nodes.iter().filter(|n| n.is_manager()).collect();
    let swarm = FakeSwarm::new(&nodes).with_cluster(&managers);
    let transport = swarm.transport();
    let log = transport.log();
    let mut coordinator = Coordinator::new(transport);

    let err = coordinator.create_swarm(&nodes).await.unwrap_err();
    assert!(matches!(err, ClusterError::ClusterAlreadyExists(ref id) if id == CLUSTER_ID));
    assert!(log.runs_starting_with("docker swarm init").is_empty());
    assert!(log.runs_starting_with("docker swarm join").is_empty());
}

#[tokio::test]
async fn create_reports_failed_join_with_context() {
    let nodes = cluster(3, 1);
    let swarm = FakeSwarm::new(&nodes);
    // wrk-1 is already in another swarm.
    swarm.state.lock().unwrap().hosts[3].role = Some(Role::Worker);
    let mut coordinator = Coordinator::new(swarm.transport());

    let err = coordinator.create_swarm(&nodes).await.unwrap_err();
    match &err {
        ClusterError::Join { role, node, cluster_id, .. } => {
            assert_eq!(*role, Role::Worker);
            assert_eq!(node, "203.0.113.101");
            assert_eq!(cluster_id, CLUSTER_ID);
        }
        other => panic!("expected Join error, got {other:?}"),
    }
    let (_, stderr) = err.command_output().unwrap();
    assert!(stderr.contains("already part of a swarm"));

    // Managers admitted before the failure stay admitted.
    for n in 1..=3 {
        assert_eq!(swarm.host(&format!("mgr-{n}")).role, Some(Role::Manager));
    }
}

#[tokio::test]
async fn invalid_quorum_issues_no_commands() {
    for managers in [0, 1, 2, 4, 6] {
        let nodes = cluster(managers, 1);
        let swarm = FakeSwarm::new(&nodes);

        let transport = swarm.transport();
        let log = transport.log();
        let mut coordinator = Coordinator::new(transport);
        let err = coordinator.create_swarm(&nodes).await.unwrap_err();
        assert!(matches!(err, ClusterError::InvalidQuorumSize(n) if n == managers as usize));
        assert!(log.is_empty(), "create with {managers} managers touched a node");

        let transport = swarm.transport().at("203.0.113.1");
        let log = transport.log();
        let mut coordinator = Coordinator::new(transport);
        let err = coordinator.update_swarm(&nodes).await.unwrap_err();
        assert!(matches!(err, ClusterError::InvalidQuorumSize(n) if n == managers as usize));
        assert!(log.is_empty(), "update with {managers} managers touched a node");
    }
}

// ── Incremental update ─────────────────────────────────────────────

#[tokio::test]
async fn update_joins_only_missing_worker() {
    let mut desired = cluster(3, 1);
    desired[3] = desired[3].clone().with_label("zone", "c");
    let existing: Vec<&MemberNode> = desired[..3].iter().collect();
    let swarm = FakeSwarm::new(&desired).with_cluster(&existing);

    let transport = swarm.transport().at("203.0.113.1");
    let log = transport.log();
    let mut coordinator = Coordinator::new(transport);

    let added = coordinator.update_swarm(&desired).await.unwrap();
    assert_eq!(added, vec!["wrk-1"]);

    let joins = log.runs_starting_with("docker swarm join ");
    assert_eq!(joins.len(), 1);
    assert_eq!(joins[0].0, "203.0.113.101");
    assert!(joins[0].1.contains("--token SWMTKN-1-worker"));

    assert_eq!(swarm.host("wrk-1").role, Some(Role::Worker));
    assert_eq!(swarm.host("wrk-1").labels, vec!["zone=c"]);
    for n in 1..=3 {
        let host = swarm.host(&format!("mgr-{n}"));
        assert!(host.labels.is_empty());
        assert!(!log.runs().iter().any(|(t, c)| *t == host.public_address && c.starts_with("docker swarm join ")));
    }

    // Left on the join target, which is one of the managers already in the cluster.
    let target = coordinator.target().unwrap().to_string();
    assert!(existing.iter().any(|m| m.public_address == target));
}

#[tokio::test]
async fn update_grows_three_managers_to_five() {
    let desired = cluster(5, 0);
    let existing: Vec<&MemberNode> = desired[..3].iter().collect();
    let swarm = FakeSwarm::new(&desired).with_cluster(&existing);

    let mut coordinator = Coordinator::new(swarm.transport().at("203.0.113.2")).with_seed(11);
    let added = coordinator.update_swarm(&desired).await.unwrap();

    assert_eq!(added, vec!["mgr-4", "mgr-5"]);
    assert_eq!(swarm.host("mgr-4").role, Some(Role::Manager));
    assert_eq!(swarm.host("mgr-5").role, Some(Role::Manager));
}

#[tokio::test]
async fn update_from_worker_fails_over_to_manager() {
    let desired = cluster(3, 2);
    let existing: Vec<&MemberNode> = desired[..4].iter().collect();
    let swarm = FakeSwarm::new(&desired).with_cluster(&existing);

    let transport = swarm.transport().at("203.0.113.101");
    let log = transport.log();
    let mut coordinator = Coordinator::new(transport);

    let added = coordinator.update_swarm(&desired).await.unwrap();
    assert_eq!(added, vec!["wrk-2"]);

    // The first switch is the failover, to the first manager's advertised address.
    let first_switch = log.switches()[0].clone();
    assert_eq!(first_switch, "10.0.0.1");
    assert_eq!(swarm.host_at(&first_switch).hostname, "mgr-1");
    let roster_queries = log.runs_starting_with("docker node ls");
    assert_eq!(roster_queries.len(), 1);
    assert_eq!(roster_queries[0].0, "10.0.0.1");
    let info_targets: Vec<String> = log
        .runs_starting_with("docker info")
        .into_iter()
        .take(2)
        .map(|(target, _)| target)
        .collect();
    assert_eq!(info_targets, vec!["203.0.113.101", "10.0.0.1"]);
}

#[tokio::test]
async fn update_with_nothing_missing_joins_nothing() {
    let desired = cluster(3, 1);
    let existing: Vec<&MemberNode> = desired.iter().collect();
    let swarm = FakeSwarm::new(&desired).with_cluster(&existing);

    let transport = swarm.transport().at("203.0.113.1");
    let log = transport.log();
    let mut coordinator = Coordinator::new(transport);

    assert!(coordinator.update_swarm(&desired).await.unwrap().is_empty());
    assert!(log.runs_starting_with("docker swarm join").is_empty());
}

#[tokio::test]
async fn update_without_cluster_fails() {
    let desired = cluster(3, 1);
    let swarm = FakeSwarm::new(&desired);

    let transport = swarm.transport().at("203.0.113.1");
    let log = transport.log();
    let mut coordinator = Coordinator::new(transport);

    let err = coordinator.update_swarm(&desired).await.unwrap_err();
    assert!(matches!(err, ClusterError::NoExistingCluster));
    assert!(log.switches().is_empty());
    assert!(log.runs_starting_with("docker swarm join").is_empty());
}

#[tokio::test]
async fn update_needs_an_existing_desired_manager() {
    // The running cluster's managers are not in the desired list at all.
    let running = cluster(3, 0);
    let mut desired: Vec<MemberNode> = (4..=6).map(|n| member(n, Role::Manager)).collect();
    desired.push(member(1, Role::Worker));

    let mut all = running.clone();
    all.extend(desired.iter().cloned());
    let existing: Vec<&MemberNode> = running.iter().collect();
    let swarm = FakeSwarm::new(&all).with_cluster(&existing);

    let transport = swarm.transport().at("203.0.113.1");
    let log = transport.log();
    let mut coordinator = Coordinator::new(transport);

    let err = coordinator.update_swarm(&desired).await.unwrap_err();
    assert!(matches!(err, ClusterError::NoSuitableManager));
    assert!(log.runs_starting_with("docker swarm join").is_empty());
}

// ── Queries ────────────────────────────────────────────────────────

#[tokio::test]
async fn nodes_and_managers_after_formation() {
    let nodes = cluster(3, 2);
    let swarm = FakeSwarm::new(&nodes);
    let mut coordinator = Coordinator::new(swarm.transport());
    coordinator.create_swarm(&nodes).await.unwrap();

    let roster = coordinator.get_nodes().await.unwrap();
    assert_eq!(roster.len(), 5);
    assert_eq!(roster.iter().filter(|n| n.is_manager()).count(), 3);
    assert_eq!(roster.iter().filter(|n| n.is_leader()).count(), 1);

    let managers = coordinator.get_managers().await.unwrap();
    let mut ids: Vec<_> = managers.iter().map(|m| m.node_id().to_string()).collect();
    ids.sort();
    assert_eq!(ids, vec!["id-mgr-1", "id-mgr-2", "id-mgr-3"]);
    assert!(managers.iter().all(|m| m.is_manager() && m.cluster_id() == CLUSTER_ID));

    let token = coordinator.join_token(Role::Worker).await.unwrap();
    assert_eq!(token, "SWMTKN-1-worker");
}

#[tokio::test]
async fn drain_after_formation() {
    let nodes = cluster(3, 1);
    let swarm = FakeSwarm::new(&nodes);
    let transport = swarm.transport();
    let log = transport.log();
    let mut coordinator = Coordinator::new(transport);
    coordinator.create_swarm(&nodes).await.unwrap();

    // Start from the worker so the drain has to fail over first.
    coordinator.switch_node("203.0.113.101").await.unwrap();
    tokio::time::pause();
    coordinator.drain_nodes(&["wrk-1".to_string()]).await.unwrap();

    let drains = log.runs_starting_with("docker node update --availability drain");
    assert_eq!(drains.len(), 1);
    assert!(drains[0].1.ends_with("wrk-1"));
    assert_ne!(drains[0].0, "203.0.113.101");
}
