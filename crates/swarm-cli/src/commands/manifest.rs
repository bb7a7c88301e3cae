use std::path::Path;

use anyhow::Context;
use swarm_core::Clusterfile;

/// Read a Clusterfile from `path`, or from stdin when `path` is `-`.
pub fn read(path: &str) -> anyhow::Result<Clusterfile> {
    let clusterfile = if path == "-" {
        Clusterfile::from_reader(std::io::stdin().lock()).context("reading Clusterfile from stdin")?
    } else {
        Clusterfile::from_file(Path::new(path)).with_context(|| format!("reading {path}"))?
    };
    Ok(clusterfile)
}

/// Read and validate a Clusterfile.
pub fn load(path: &str) -> anyhow::Result<Clusterfile> {
    let clusterfile = read(path)?;
    clusterfile
        .validate()
        .with_context(|| format!("invalid Clusterfile {path}"))?;
    Ok(clusterfile)
}

pub fn validate(path: &str) -> anyhow::Result<()> {
    let clusterfile = load(path)?;
    println!(
        "✓ {path}: {} managers, {} workers",
        clusterfile.managers().len(),
        clusterfile.workers().len()
    );
    Ok(())
}
