//! The fixed vocabulary of `docker` commands swarmgrid issues.
//!
//! Every command is rendered to a single shell line so any transport
//! that can run `sh -c` (locally or over ssh) can execute it.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use crate::address::HostPort;
use crate::types::{Availability, Role};

/// Port managers listen on for cluster management traffic.
pub const SWARM_PORT: u16 = 2377;

const JSON_FORMAT: &str = "'{{json .}}'";

/// A flag fragment for `docker node update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateFlag {
    Availability(Availability),
    LabelAdd { key: String, value: String },
}

impl UpdateFlag {
    fn render(&self) -> String {
        match self {
            UpdateFlag::Availability(a) => format!("--availability {a}"),
            UpdateFlag::LabelAdd { key, value } if value.is_empty() => {
                format!("--label-add {}", shell_quote(key))
            }
            UpdateFlag::LabelAdd { key, value } => {
                format!("--label-add {}", shell_quote(&format!("{key}={value}")))
            }
        }
    }
}

/// One `--label-add` flag per label, in key order.
pub fn label_flags(labels: &BTreeMap<String, String>) -> Vec<UpdateFlag> {
    labels
        .iter()
        .map(|(key, value)| UpdateFlag::LabelAdd {
            key: key.clone(),
            value: value.clone(),
        })
        .collect()
}

/// An administrative command against a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwarmCommand {
    /// `docker info` as a single JSON object.
    Info,
    /// `docker node ls` as line-delimited JSON.
    ListNodes,
    /// `docker node ps <node>` as line-delimited JSON.
    ListTasks { node: String },
    Init { advertise_addr: String },
    Join {
        advertise_addr: String,
        token: String,
        manager_addr: String,
        port: u16,
    },
    JoinToken { role: Role },
    UpdateNode { flags: Vec<UpdateFlag>, node: String },
}

impl SwarmCommand {
    pub fn list_tasks(node: &str) -> Self {
        SwarmCommand::ListTasks {
            node: node.to_string(),
        }
    }

    pub fn init(advertise_addr: &str) -> Self {
        SwarmCommand::Init {
            advertise_addr: advertise_addr.to_string(),
        }
    }

    pub fn join(advertise_addr: &str, token: &str, manager_addr: &str, port: u16) -> Self {
        SwarmCommand::Join {
            advertise_addr: advertise_addr.to_string(),
            token: token.to_string(),
            manager_addr: manager_addr.to_string(),
            port,
        }
    }

    pub fn set_availability(node: &str, availability: Availability) -> Self {
        SwarmCommand::UpdateNode {
            flags: vec![UpdateFlag::Availability(availability)],
            node: node.to_string(),
        }
    }

    pub fn add_labels(node: &str, labels: &BTreeMap<String, String>) -> Self {
        SwarmCommand::UpdateNode {
            flags: label_flags(labels),
            node: node.to_string(),
        }
    }

    /// Short name used in logs and error context.
    pub fn verb(&self) -> &'static str {
        match self {
            SwarmCommand::Info => "info",
            SwarmCommand::ListNodes => "node ls",
            SwarmCommand::ListTasks { .. } => "node ps",
            SwarmCommand::Init { .. } => "swarm init",
            SwarmCommand::Join { .. } => "swarm join",
            SwarmCommand::JoinToken { .. } => "swarm join-token",
            SwarmCommand::UpdateNode { .. } => "node update",
        }
    }

    /// Whether running the command changes cluster state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            SwarmCommand::Init { .. } | SwarmCommand::Join { .. } | SwarmCommand::UpdateNode { .. }
        )
    }

    /// Render the shell command line.
    pub fn render(&self) -> String {
        match self {
            SwarmCommand::Info => format!("docker info --format {JSON_FORMAT}"),
            SwarmCommand::ListNodes => format!("docker node ls --format {JSON_FORMAT}"),
            SwarmCommand::ListTasks { node } => {
                format!("docker node ps --format {JSON_FORMAT} {}", shell_quote(node))
            }
            SwarmCommand::Init { advertise_addr } => {
                let addr = shell_quote(advertise_addr);
                format!("docker swarm init --advertise-addr {addr} --listen-addr {addr}")
            }
            SwarmCommand::Join {
                advertise_addr,
                token,
                manager_addr,
                port,
            } => {
                let addr = shell_quote(advertise_addr);
                let remote = HostPort {
                    host: manager_addr.clone(),
                    port: Some(*port),
                };
                format!(
                    "docker swarm join --advertise-addr {addr} --listen-addr {addr} --token {} {}",
                    shell_quote(token),
                    shell_quote(&remote.to_string()),
                )
            }
            SwarmCommand::JoinToken { role } => format!("docker swarm join-token -q {role}"),
            SwarmCommand::UpdateNode { flags, node } => {
                let mut line = String::from("docker node update");
                for flag in flags {
                    line.push(' ');
                    line.push_str(&flag.render());
                }
                line.push(' ');
                line.push_str(&shell_quote(node));
                line
            }
        }
    }
}

impl fmt::Display for SwarmCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Quote `s` for POSIX `sh` unless it only has shell-safe characters.
pub fn shell_quote(s: &str) -> Cow<'_, str> {
    let safe = !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '/' | '=' | ',' | '@' | '+' | '%')
        });
    if safe {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(format!("'{}'", s.replace('\'', r"'\''")))
    }
}
