//! Scripted transport for tests and dry runs.
//!
//! Every `switch` and `run` call is appended to a shared [`MockLog`].
//! Commands are answered by a responder closure that sees the current
//! target and the command line, and returns stdout or an error.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use swarm_core::HostPort;

use crate::error::{ExecError, ExecResult};
use crate::transport::{CommandOutput, Transport};

type Responder = Box<dyn FnMut(&str, &str) -> ExecResult<String> + Send>;

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Switch { address: String, accepted: bool },
    Run { target: String, command: String },
}

/// Shared, cloneable view of the calls a `MockTransport` received.
#[derive(Debug, Clone, Default)]
pub struct MockLog {
    events: Arc<Mutex<Vec<MockEvent>>>,
}

impl MockLog {
    fn push(&self, event: MockEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Every `(target, command)` run, in order.
    pub fn runs(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MockEvent::Run { target, command } => Some((target, command)),
                MockEvent::Switch { .. } => None,
            })
            .collect()
    }

    /// Every address passed to `switch`, accepted or not.
    pub fn switches(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MockEvent::Switch { address, .. } => Some(address),
                MockEvent::Run { .. } => None,
            })
            .collect()
    }

    /// Runs whose command line starts with `prefix`.
    pub fn runs_starting_with(&self, prefix: &str) -> Vec<(String, String)> {
        self.runs()
            .into_iter()
            .filter(|(_, command)| command.starts_with(prefix))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events().is_empty()
    }
}

/// A transport that answers from a closure instead of running anything.
pub struct MockTransport {
    target: Option<String>,
    unreachable: HashSet<String>,
    responder: Responder,
    log: MockLog,
}

impl MockTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: FnMut(&str, &str) -> ExecResult<String> + Send + 'static,
    {
        Self {
            target: None,
            unreachable: HashSet::new(),
            responder: Box::new(responder),
            log: MockLog::default(),
        }
    }

    /// Start with `address` as the current target.
    pub fn at(mut self, address: impl Into<String>) -> Self {
        self.target = Some(address.into());
        self
    }

    /// Make switching to `address` fail as unreachable.
    pub fn unreachable(mut self, address: impl Into<String>) -> Self {
        self.unreachable.insert(address.into());
        self
    }

    pub fn log(&self) -> MockLog {
        self.log.clone()
    }
}

impl Transport for MockTransport {
    fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    async fn switch(&mut self, address: &str) -> ExecResult<()> {
        let result = if self.target.as_deref() == Some(address) {
            Ok(())
        } else if self.unreachable.contains(address) {
            Err(ExecError::Unreachable {
                address: address.to_string(),
                reason: "marked unreachable".to_string(),
            })
        } else {
            HostPort::parse(address)
                .map(|_| ())
                .map_err(ExecError::from)
        };

        self.log.push(MockEvent::Switch {
            address: address.to_string(),
            accepted: result.is_ok(),
        });

        if result.is_ok() {
            self.target = Some(address.to_string());
        }
        result
    }

    async fn run(&mut self, command: &str) -> ExecResult<CommandOutput> {
        let target = self.target.clone().ok_or(ExecError::NoTarget)?;
        self.log.push(MockEvent::Run {
            target: target.clone(),
            command: command.to_string(),
        });

        let stdout = (self.responder)(&target, command)?;
        Ok(CommandOutput {
            stdout,
            stderr: String::new(),
        })
    }
}
