//! nua - Nebraska update agent
//!
//! Keeps a Kubernetes cluster (through Flux), a Docker container or a host
//! service on the version Nebraska announces for its channel.

use anyhow::Result;
use clap::{Parser, Subcommand};
use nua::cli::{self, KubernetesArgs, NodeArgs};

/// nua - Nebraska update agent
#[derive(Parser, Debug)]
#[command(name = "nua")]
#[command(about = "Nebraska update agent for Flux clusters and nodes", long_about = None)]
struct Args {
    /// Output verbose logs
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Main commands
#[derive(Subcommand, Debug)]
enum Command {
    /// Manage kubernetes updates
    Kubernetes(KubernetesArgs),
    /// Manage node updates
    Node(NodeArgs),
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Command::Version = args.command {
        cli::display_version();
        return Ok(());
    }

    cli::init_logging(args.verbose);

    let result = match args.command {
        Command::Kubernetes(args) => cli::run_kubernetes(args).await,
        Command::Node(args) => cli::run_node(args).await,
        Command::Version => Ok(()),
    };

    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }
    result
}
