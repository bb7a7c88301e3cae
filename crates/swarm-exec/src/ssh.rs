//! Remote-shell transport over the system `ssh` client.

use std::path::PathBuf;
use std::time::Duration;

use swarm_core::HostPort;
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ExecError, ExecResult};
use crate::transport::{into_result, CommandOutput, Transport};

const SSH_PROGRAM: &str = "ssh";

/// Configuration for the ssh transport.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Remote login user. Defaults to the ssh client's own default.
    pub user: Option<String>,
    /// Port used when a target address carries none.
    pub port: u16,
    /// Private key passed with `-i`.
    pub identity_file: Option<PathBuf>,
    /// Bound on the reachability probe and on ssh's own connect.
    pub connect_timeout: Duration,
    /// Extra `-o` options, e.g. `StrictHostKeyChecking=accept-new`.
    pub options: Vec<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: None,
            port: 22,
            identity_file: None,
            connect_timeout: Duration::from_secs(5),
            options: Vec::new(),
        }
    }
}

/// Runs commands on remote nodes with `ssh <host> -- <command>`.
#[derive(Debug, Clone)]
pub struct SshTransport {
    config: SshConfig,
    /// Address as given to `switch`, and its parsed form.
    target: Option<(String, HostPort)>,
}

impl SshTransport {
    pub fn new(config: SshConfig) -> Self {
        Self {
            config,
            target: None,
        }
    }

    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Arguments passed to the ssh client to run `command` on `target`.
    pub fn ssh_args(&self, target: &HostPort, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.config.connect_timeout.as_secs().max(1)),
            "-p".to_string(),
            target.port.unwrap_or(self.config.port).to_string(),
        ];
        if let Some(key) = &self.config.identity_file {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        if let Some(user) = &self.config.user {
            args.push("-l".to_string());
            args.push(user.clone());
        }
        for option in &self.config.options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        args.push(target.host.clone());
        args.push("--".to_string());
        args.push(command.to_string());
        args
    }

    /// Check the node's ssh port accepts TCP connections.
    async fn probe(&self, address: &str, target: &HostPort) -> ExecResult<()> {
        let endpoint = target.with_port(self.config.port);
        let unreachable = |reason: String| ExecError::Unreachable {
            address: address.to_string(),
            reason,
        };

        match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(endpoint.as_str())).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(unreachable(format!("connect to {endpoint}: {e}"))),
            Err(_) => Err(unreachable(format!(
                "connect to {endpoint} timed out after {:?}",
                self.config.connect_timeout
            ))),
        }
    }
}

impl Transport for SshTransport {
    fn target(&self) -> Option<&str> {
        self.target.as_ref().map(|(address, _)| address.as_str())
    }

    async fn switch(&mut self, address: &str) -> ExecResult<()> {
        if self.target() == Some(address) {
            return Ok(());
        }

        let parsed = HostPort::parse(address)?;
        self.probe(address, &parsed).await?;

        info!(%address, "switched ssh target");
        self.target = Some((address.to_string(), parsed));
        Ok(())
    }

    async fn run(&mut self, command: &str) -> ExecResult<CommandOutput> {
        let (address, target) = self.target.as_ref().ok_or(ExecError::NoTarget)?;

        debug!(%address, %command, "running remote command");

        let output = Command::new(SSH_PROGRAM)
            .args(self.ssh_args(target, command))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ExecError::Spawn {
                program: SSH_PROGRAM.to_string(),
                source,
            })?;

        into_result(command, output)
    }
}
