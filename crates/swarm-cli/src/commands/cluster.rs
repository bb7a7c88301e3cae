use swarm_cluster::Coordinator;
use swarm_exec::Transport;
use tracing::info;

use super::manifest;
use super::query::format_nodes;

pub async fn create<T: Transport>(coordinator: &mut Coordinator<T>, path: &str) -> anyhow::Result<()> {
    let clusterfile = manifest::load(path)?;

    let cluster_id = coordinator.create_swarm(&clusterfile.nodes).await?;
    println!("Swarm Cluster successfully created with id: {cluster_id}");

    let nodes = coordinator.get_nodes().await?;
    print!("{}", format_nodes(&nodes));
    Ok(())
}

pub async fn update<T: Transport>(coordinator: &mut Coordinator<T>, path: &str) -> anyhow::Result<()> {
    let clusterfile = manifest::load(path)?;

    let added = coordinator.update_swarm(&clusterfile.nodes).await?;
    if added.is_empty() {
        println!("Swarm Cluster already has every member");
    } else {
        println!("Joined {} node(s): {}", added.len(), added.join(", "));
    }

    let nodes = coordinator.get_nodes().await?;
    print!("{}", format_nodes(&nodes));
    Ok(())
}

pub async fn drain<T: Transport>(coordinator: &mut Coordinator<T>, nodes: &[String]) -> anyhow::Result<()> {
    info!(count = nodes.len(), "draining nodes");
    coordinator.drain_nodes(nodes).await?;
    for node in nodes {
        println!("✓ drained {node}");
    }
    Ok(())
}
