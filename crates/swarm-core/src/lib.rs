//! swarm-core — shared vocabulary for swarmgrid.
//!
//! Holds everything the coordinator needs that is pure data: the typed
//! views over `docker` command output, the fixed set of administrative
//! commands, address parsing, and the `Clusterfile` membership manifest.

pub mod address;
pub mod commands;
pub mod decode;
pub mod manifest;
pub mod types;

pub use address::{split_host, AddressError, HostPort};
pub use commands::{SwarmCommand, UpdateFlag};
pub use decode::{decode_json, decode_json_lines, DecodeError};
pub use manifest::{Clusterfile, ManifestError};
pub use types::*;
