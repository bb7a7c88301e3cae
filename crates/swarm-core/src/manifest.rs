//! Clusterfile parser.
//!
//! A Clusterfile is a TOML membership manifest: one `[[nodes]]` table per
//! machine, each with a role and optional labels.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{filter_by_role, is_valid_quorum, MemberNode, Role};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read Clusterfile: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse Clusterfile: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize Clusterfile: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Clusterfile declares no nodes")]
    Empty,

    #[error("node #{index} has an empty {field}")]
    MissingField { index: usize, field: &'static str },

    #[error("duplicate hostname: {0}")]
    DuplicateHostname(String),

    #[error("duplicate public address: {0}")]
    DuplicateAddress(String),

    #[error("expected 3 or 5 managers but got {0}")]
    QuorumSize(usize),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Clusterfile {
    #[serde(default)]
    pub nodes: Vec<MemberNode>,
}

impl Clusterfile {
    pub fn new(nodes: Vec<MemberNode>) -> Self {
        Self { nodes }
    }

    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// Read a Clusterfile from any reader (e.g. stdin).
    pub fn from_reader(mut reader: impl Read) -> Result<Self, ManifestError> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        content.parse()
    }

    pub fn to_toml_string(&self) -> Result<String, ManifestError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn managers(&self) -> Vec<&MemberNode> {
        filter_by_role(&self.nodes, Role::Manager)
    }

    pub fn workers(&self) -> Vec<&MemberNode> {
        filter_by_role(&self.nodes, Role::Worker)
    }

    /// Check the manifest describes a formable cluster.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.nodes.is_empty() {
            return Err(ManifestError::Empty);
        }

        let mut hostnames = HashSet::new();
        let mut addresses = HashSet::new();

        for (index, node) in self.nodes.iter().enumerate() {
            for (field, value) in [
                ("hostname", &node.hostname),
                ("public_address", &node.public_address),
                ("private_address", &node.private_address),
            ] {
                if value.trim().is_empty() {
                    return Err(ManifestError::MissingField { index, field });
                }
            }
            if !hostnames.insert(node.hostname.as_str()) {
                return Err(ManifestError::DuplicateHostname(node.hostname.clone()));
            }
            if !addresses.insert(node.public_address.as_str()) {
                return Err(ManifestError::DuplicateAddress(node.public_address.clone()));
            }
        }

        let managers = self.managers().len();
        if !is_valid_quorum(managers) {
            return Err(ManifestError::QuorumSize(managers));
        }

        Ok(())
    }
}

impl FromStr for Clusterfile {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}
