pub mod cluster;
pub mod manifest;
pub mod query;

use clap::ValueEnum;

/// How query results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
