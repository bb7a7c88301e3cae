//! swarm-cluster — lifecycle coordination for a Docker Swarm cluster.
//!
//! The [`Coordinator`] drives every multi-step protocol against one
//! "current" node at a time through a [`swarm_exec::Transport`].
//!
//! # Architecture
//!
//! ```text
//! Coordinator<T: Transport>
//!   ├── ensure_manager()  → failover to a remote manager if needed
//!   ├── create_swarm()    → init on a random manager, join the rest
//!   ├── update_swarm()    → join members missing from the roster
//!   ├── drain_nodes()     → set availability=drain, poll until idle
//!   └── get_info() / get_nodes() / get_managers() / join_token()
//! ```
//!
//! Every protocol is sequential. Nothing is rolled back on failure; the
//! error names the node and cluster so an operator can resume by hand.

pub mod config;
pub mod coordinator;
pub mod drain;
pub mod error;
pub mod formation;

pub use config::CoordinatorConfig;
pub use coordinator::Coordinator;
pub use drain::DrainState;
pub use error::{ClusterError, ClusterResult};
pub use formation::JoinTokens;
