//! Local subprocess transport.

use swarm_core::HostPort;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ExecError, ExecResult};
use crate::transport::{into_result, CommandOutput, Transport};

const LOOPBACK: &[&str] = &["localhost", "127.0.0.1", "::1"];

/// Runs commands with `sh -c` on the machine swarmgrid runs on.
///
/// Only this machine can be targeted: loopback names and, optionally, the
/// machine's own hostname. Anything else is reported as unreachable.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    shell: String,
    hostname: Option<String>,
    target: Option<String>,
}

impl LocalTransport {
    /// Create a transport targeting `localhost`.
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
            hostname: None,
            target: Some("localhost".to_string()),
        }
    }

    /// Also accept this machine's hostname as a target.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Use a different POSIX shell.
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    fn is_local(&self, host: &str) -> bool {
        LOOPBACK.contains(&host) || self.hostname.as_deref() == Some(host)
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LocalTransport {
    fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    async fn switch(&mut self, address: &str) -> ExecResult<()> {
        if self.target.as_deref() == Some(address) {
            return Ok(());
        }

        let hp = HostPort::parse(address)?;
        if !self.is_local(&hp.host) {
            return Err(ExecError::Unreachable {
                address: address.to_string(),
                reason: "local transport can only target this machine".to_string(),
            });
        }

        self.target = Some(address.to_string());
        Ok(())
    }

    async fn run(&mut self, command: &str) -> ExecResult<CommandOutput> {
        if self.target.is_none() {
            return Err(ExecError::NoTarget);
        }

        debug!(shell = %self.shell, %command, "running local command");

        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ExecError::Spawn {
                program: self.shell.clone(),
                source,
            })?;

        into_result(command, output)
    }
}
