//! Coordinator error types.

use std::time::Duration;

use swarm_core::{DecodeError, Role};
use swarm_exec::ExecError;
use thiserror::Error;

/// Result type alias for coordinator operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors surfaced by the coordinator.
///
/// Context variants (`Join`, `Label`, `Drain`, `Step`) wrap the failure
/// that caused them; [`ClusterError::root_cause`] unwraps them.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("error switching to node {address}")]
    Transport {
        address: String,
        #[source]
        source: ExecError,
    },

    #[error("error running {verb} on {target}")]
    Execution {
        target: String,
        verb: &'static str,
        #[source]
        source: ExecError,
    },

    #[error("malformed {what} output from {target}: {reason}")]
    Deserialization {
        target: String,
        what: &'static str,
        reason: String,
    },

    #[error("expected 3 or 5 managers but got {0}")]
    InvalidQuorumSize(usize),

    #[error("swarm cluster with id {0} already exists")]
    ClusterAlreadyExists(String),

    #[error("no swarm cluster found")]
    NoExistingCluster,

    #[error("unable to connect to a suitable manager")]
    NoSuitableManager,

    #[error("timed out waiting for {node} to drain after {elapsed:?}")]
    DrainTimeout { node: String, elapsed: Duration },

    #[error("error joining {role} {node} to {leader} on swarm cluster {cluster_id}")]
    Join {
        role: Role,
        node: String,
        leader: String,
        cluster_id: String,
        #[source]
        source: Box<ClusterError>,
    },

    #[error("error labelling node {node}")]
    Label {
        node: String,
        #[source]
        source: Box<ClusterError>,
    },

    #[error("error draining node {node}")]
    Drain {
        node: String,
        #[source]
        source: Box<ClusterError>,
    },

    #[error("error {step}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<ClusterError>,
    },
}

impl ClusterError {
    pub(crate) fn decode(target: &str, err: DecodeError) -> Self {
        ClusterError::Deserialization {
            target: target.to_string(),
            what: err.what,
            reason: err.source.to_string(),
        }
    }

    /// Wrap with a description of the step that failed.
    pub(crate) fn during(step: &'static str) -> impl FnOnce(ClusterError) -> ClusterError {
        move |source| ClusterError::Step {
            step,
            source: Box::new(source),
        }
    }

    /// The innermost error, skipping context wrappers.
    pub fn root_cause(&self) -> &ClusterError {
        let mut err = self;
        loop {
            match err {
                ClusterError::Join { source, .. }
                | ClusterError::Label { source, .. }
                | ClusterError::Drain { source, .. }
                | ClusterError::Step { source, .. } => err = source.as_ref(),
                _ => return err,
            }
        }
    }

    /// The captured streams, if a remote command ran and failed.
    pub fn command_output(&self) -> Option<(&str, &str)> {
        match self.root_cause() {
            ClusterError::Execution {
                source: ExecError::Failed { stdout, stderr, .. },
                ..
            } => Some((stdout.as_str(), stderr.as_str())),
            _ => None,
        }
    }
}
