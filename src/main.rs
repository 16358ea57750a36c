use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cli;
mod client;
mod cluster_version;
mod greenhouse;
mod kubeconfig;
mod settings;
mod sync;

#[derive(Parser)]
#[command(
    name = "cloudctl",
    version,
    about = "Manage and access Kubernetes clusters via Greenhouse"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file [default: <config dir>/cloudctl/config.toml]
    #[arg(long, env = "CLOUDCTL_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch kubeconfigs of remote clusters from Greenhouse and merge them into your local config
    Sync(cli::commands::SyncArgs),

    /// Print the Kubernetes version of a kubeconfig context
    ClusterVersion {
        /// Kubeconfig file [default: ~/.kube/config]
        #[arg(short = 'k', long)]
        kubeconfig: Option<String>,
        /// Context to query (uses the current context if omitted)
        #[arg(short = 'c', long)]
        context: Option<String>,
    },

    /// Print cloudctl version information
    Version {
        /// Print only the version number
        #[arg(long)]
        short: bool,
        /// Print version information as JSON
        #[arg(long, conflicts_with = "short")]
        json: bool,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,cloudctl={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Commands::Sync(args) => settings::Settings::load(cli.config.as_deref())
            .and_then(|settings| cli::commands::cmd_sync(args, &settings)),
        Commands::ClusterVersion {
            kubeconfig,
            context,
        } => cli::commands::cmd_cluster_version(kubeconfig.as_deref(), context.as_deref()),
        Commands::Version { short, json } => cli::commands::cmd_version(*short, *json),
    };

    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
