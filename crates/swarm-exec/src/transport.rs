//! The transport contract consumed by the coordinator.

use std::future::Future;
use std::process::Output;

use crate::error::{ExecError, ExecResult};

/// Captured output of a command that exited successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Executes commands against one "current" node.
///
/// Implementations are driven through `&mut self`: exactly one target is
/// current at a time and commands run strictly one after another.
pub trait Transport: Send {
    /// The current target address, if one has been selected.
    fn target(&self) -> Option<&str>;

    /// Make `address` the target of subsequent commands.
    ///
    /// Switching to the current target succeeds without side effects.
    fn switch(&mut self, address: &str) -> impl Future<Output = ExecResult<()>> + Send;

    /// Run `command` on the current target and capture both streams.
    ///
    /// A non-zero exit status is returned as [`ExecError::Failed`].
    fn run(&mut self, command: &str) -> impl Future<Output = ExecResult<CommandOutput>> + Send;
}

/// Turn a finished process into a `CommandOutput` or `ExecError::Failed`.
pub(crate) fn into_result(command: &str, output: Output) -> ExecResult<CommandOutput> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if output.status.success() {
        Ok(CommandOutput { stdout, stderr })
    } else {
        Err(ExecError::Failed {
            command: command.to_string(),
            code: output.status.code(),
            stdout,
            stderr,
        })
    }
}
