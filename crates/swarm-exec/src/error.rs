//! Error types for command execution.

use swarm_core::AddressError;
use thiserror::Error;

/// Result type alias for transport operations.
pub type ExecResult<T> = Result<T, ExecError>;

/// Errors that can occur while switching targets or running commands.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("invalid target address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("target {address} is unreachable: {reason}")]
    Unreachable { address: String, reason: String },

    #[error("no target node selected")]
    NoTarget,

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}: {}", describe_code(.code), .stderr.trim())]
    Failed {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

impl ExecError {
    /// A command that ran and exited non-zero.
    pub fn failed(command: &str, code: i32, stderr: &str) -> Self {
        ExecError::Failed {
            command: command.to_string(),
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    /// Whether the failure happened before the command could run.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            ExecError::InvalidAddress(_) | ExecError::Unreachable { .. } | ExecError::NoTarget
        )
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}
