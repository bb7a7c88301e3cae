use std::fmt::Write;

use swarm_cluster::Coordinator;
use swarm_core::{NodeInfo, NodeStatus, Role};
use swarm_exec::Transport;

use super::OutputFormat;

pub async fn info<T: Transport>(coordinator: &mut Coordinator<T>, format: OutputFormat) -> anyhow::Result<()> {
    let info = coordinator.get_info().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&info)?),
        OutputFormat::Text => print!("{}", format_info(&info)),
    }
    Ok(())
}

pub async fn nodes<T: Transport>(coordinator: &mut Coordinator<T>, format: OutputFormat) -> anyhow::Result<()> {
    let nodes = coordinator.get_nodes().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&nodes)?),
        OutputFormat::Text => print!("{}", format_nodes(&nodes)),
    }
    Ok(())
}

pub async fn managers<T: Transport>(coordinator: &mut Coordinator<T>, format: OutputFormat) -> anyhow::Result<()> {
    let managers = coordinator.get_managers().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&managers)?),
        OutputFormat::Text => {
            for manager in &managers {
                println!("{}", format_manager(manager));
            }
        }
    }
    Ok(())
}

pub async fn token<T: Transport>(coordinator: &mut Coordinator<T>, role: Role) -> anyhow::Result<()> {
    coordinator.ensure_manager().await?;
    println!("{}", coordinator.join_token(role).await?);
    Ok(())
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

pub fn format_info(info: &NodeInfo) -> String {
    let swarm = &info.swarm;
    let remote: Vec<&str> = info.remote_manager_addrs().collect();

    let mut out = String::new();
    let _ = writeln!(out, "Name:            {}", or_dash(&info.name));
    let _ = writeln!(out, "Node ID:         {}", or_dash(&swarm.node_id));
    let _ = writeln!(out, "Node address:    {}", or_dash(&swarm.node_addr));
    let _ = writeln!(out, "State:           {}", or_dash(&swarm.local_node_state));
    let _ = writeln!(out, "Manager:         {}", if info.is_manager() { "yes" } else { "no" });
    let _ = writeln!(out, "Cluster ID:      {}", or_dash(info.cluster_id()));
    let _ = writeln!(out, "Remote managers: {}", if remote.is_empty() { "-".to_string() } else { remote.join(", ") });
    out
}

pub fn format_manager(info: &NodeInfo) -> String {
    format!(
        "{}  {}  {}",
        or_dash(info.node_id()),
        or_dash(&info.name),
        or_dash(&info.swarm.node_addr)
    )
}

/// `docker node ls`-style table.
pub fn format_nodes(nodes: &[NodeStatus]) -> String {
    const HEADERS: [&str; 5] = ["ID", "HOSTNAME", "STATUS", "AVAILABILITY", "MANAGER STATUS"];

    let rows: Vec<[&str; 5]> = nodes
        .iter()
        .map(|n| {
            [
                n.id.as_str(),
                n.hostname.as_str(),
                n.status.as_str(),
                n.availability.as_str(),
                n.manager_status.as_str(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    for row in std::iter::once(HEADERS).chain(rows) {
        let line: Vec<String> = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        let _ = writeln!(out, "{}", line.join("  ").trim_end());
    }
    out
}
