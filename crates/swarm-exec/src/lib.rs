//! swarm-exec — run commands against one node at a time.
//!
//! A [`Transport`] holds a single "current" target. The coordinator
//! switches it between nodes and runs one command line at a time on
//! whichever node is current.
//!
//! ```text
//! Transport
//!   ├── LocalTransport   sh -c on this machine (loopback targets only)
//!   ├── SshTransport     ssh -o BatchMode=yes <host> -- <command>
//!   └── MockTransport    scripted responses + call log, for tests
//! ```

pub mod error;
pub mod local;
pub mod mock;
pub mod ssh;
pub mod transport;

pub use error::{ExecError, ExecResult};
pub use local::LocalTransport;
pub use mock::{MockEvent, MockLog, MockTransport};
pub use ssh::{SshConfig, SshTransport};
pub use transport::{CommandOutput, Transport};
