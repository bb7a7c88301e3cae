//! swarmctl — form, grow and drain Docker Swarm clusters.
//!
//! # Usage
//!
//! ```text
//! swarmctl create Clusterfile
//! swarmctl --target 203.0.113.10 update Clusterfile
//! swarmctl --target 203.0.113.10 drain wrk-1 wrk-2
//! swarmctl --transport local nodes --format json
//! ```
//!
//! Logs go to stderr (`RUST_LOG` overrides the default filter) so stdout
//! only carries results.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use swarm_cluster::{Coordinator, CoordinatorConfig};
use swarm_core::commands::SWARM_PORT;
use swarm_core::Role;
use swarm_exec::{LocalTransport, SshConfig, SshTransport, Transport};
use tracing::debug;

mod commands;

use commands::OutputFormat;

const DEFAULT_LOG_FILTER: &str = "swarmctl=info,swarm_cluster=info";

#[derive(Parser)]
#[command(
    name = "swarmctl",
    about = "swarmgrid — Docker Swarm cluster lifecycle coordinator",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Log line format on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    /// Run commands on this machine.
    Local,
    /// Run commands over ssh.
    Ssh,
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    /// How commands reach the nodes.
    #[arg(long, global = true, value_enum, default_value_t = TransportKind::Ssh)]
    transport: TransportKind,

    /// Node to run commands against first. Not needed for `create`.
    #[arg(short, long, global = true)]
    target: Option<String>,

    /// Remote login user.
    #[arg(long, global = true)]
    ssh_user: Option<String>,

    /// ssh port used when a node address carries none.
    #[arg(long, global = true, default_value = "22")]
    ssh_port: u16,

    /// Private key for ssh.
    #[arg(long, global = true)]
    ssh_key: Option<PathBuf>,

    /// Extra ssh `-o` option, e.g. StrictHostKeyChecking=accept-new. Repeatable.
    #[arg(short = 'o', long = "ssh-option", global = true)]
    ssh_options: Vec<String>,

    /// Reachability probe timeout in seconds.
    #[arg(long, global = true, default_value = "5")]
    connect_timeout: u64,

    /// Port joining nodes use to reach a manager.
    #[arg(long, global = true, default_value_t = SWARM_PORT)]
    swarm_port: u16,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Form a new cluster from a Clusterfile ("-" reads stdin).
    Create {
        clusterfile: String,
    },
    /// Join every Clusterfile member missing from the running cluster.
    Update {
        clusterfile: String,
    },
    /// Drain nodes one at a time and wait for their tasks to stop.
    Drain {
        /// Poll interval in seconds.
        #[arg(long, default_value = "5")]
        interval: u64,
        /// Per-node timeout in seconds.
        #[arg(long, default_value = "600")]
        timeout: u64,
        /// Node ids or hostnames.
        #[arg(required = true)]
        nodes: Vec<String>,
    },
    /// Show the target node's view of the cluster.
    Info {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// List cluster nodes.
    Nodes {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Show every manager the target knows about.
    Managers {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print the join token for a role.
    Token {
        #[arg(value_parser = parse_role)]
        role: Role,
    },
    /// Parse and validate a Clusterfile without touching any node.
    Validate {
        clusterfile: String,
    },
}

fn parse_role(s: &str) -> Result<Role, String> {
    s.parse::<Role>().map_err(|e| e.to_string())
}

impl Commands {
    fn needs_target(&self) -> bool {
        !matches!(self, Commands::Create { .. } | Commands::Validate { .. })
    }
}

fn coordinator_config(connection: &ConnectionArgs, command: &Commands) -> CoordinatorConfig {
    let config = CoordinatorConfig::default().with_swarm_port(connection.swarm_port);
    match command {
        Commands::Drain { interval, timeout, .. } => config
            .with_drain_poll_interval(Duration::from_secs(*interval))
            .with_drain_timeout(Duration::from_secs(*timeout)),
        _ => config,
    }
}

fn ssh_config(connection: &ConnectionArgs) -> SshConfig {
    SshConfig {
        user: connection.ssh_user.clone(),
        port: connection.ssh_port,
        identity_file: connection.ssh_key.clone(),
        connect_timeout: Duration::from_secs(connection.connect_timeout),
        options: connection.ssh_options.clone(),
    }
}

fn init_tracing(format: LogFormat) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    if let Commands::Validate { clusterfile } = &cli.command {
        return commands::manifest::validate(clusterfile);
    }

    let config = coordinator_config(&cli.connection, &cli.command);
    match cli.connection.transport {
        TransportKind::Local => {
            let coordinator = Coordinator::with_config(LocalTransport::new(), config);
            run(coordinator, &cli.connection, cli.command).await
        }
        TransportKind::Ssh => {
            let transport = SshTransport::new(ssh_config(&cli.connection));
            let coordinator = Coordinator::with_config(transport, config);
            run(coordinator, &cli.connection, cli.command).await
        }
    }
}

async fn run<T: Transport>(
    mut coordinator: Coordinator<T>,
    connection: &ConnectionArgs,
    command: Commands,
) -> anyhow::Result<()> {
    if let Some(target) = &connection.target {
        coordinator
            .switch_node(target)
            .await
            .with_context(|| format!("cannot reach --target {target}"))?;
    } else if command.needs_target() && coordinator.target().is_none() {
        anyhow::bail!("--target is required with the {:?} transport", connection.transport);
    }
    debug!(node = ?coordinator.target(), "starting");

    match command {
        Commands::Create { clusterfile } => commands::cluster::create(&mut coordinator, &clusterfile).await,
        Commands::Update { clusterfile } => commands::cluster::update(&mut coordinator, &clusterfile).await,
        Commands::Drain { nodes, .. } => commands::cluster::drain(&mut coordinator, &nodes).await,
        Commands::Info { format } => commands::query::info(&mut coordinator, format).await,
        Commands::Nodes { format } => commands::query::nodes(&mut coordinator, format).await,
        Commands::Managers { format } => commands::query::managers(&mut coordinator, format).await,
        Commands::Token { role } => commands::query::token(&mut coordinator, role).await,
        Commands::Validate { clusterfile } => commands::manifest::validate(&clusterfile),
    }
}
