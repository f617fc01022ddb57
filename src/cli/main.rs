//! CLI binary entry point for chain-catalog

#[cfg(feature = "cli")]
use chain_catalog::cli::commands::GlobalArgs;
#[cfg(feature = "cli")]
use chain_catalog::cli::commands::chains::{handle_list_chains, handle_list_tables, handle_plan};
#[cfg(feature = "cli")]
use chain_catalog::cli::commands::discover::{DiscoverArgs, handle_discover};
#[cfg(feature = "cli")]
use chain_catalog::cli::commands::jobs::{
    CompleteArgs, handle_complete, handle_job_status, handle_trigger_job,
};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "chain-catalog")]
#[command(about = "Discover blockchain datasets and reconcile their catalog and crawl jobs")]
#[command(version)]
struct Cli {
    /// Configuration file (default: ./.chain-catalog.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dataset bucket, overrides the configuration
    #[arg(long, global = true)]
    bucket: Option<String>,

    /// Bucket region, overrides the configuration
    #[arg(long, global = true)]
    region: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Discover chains and reconcile catalog namespaces and crawl jobs
    Discover {
        /// Write the report JSON to this file as well
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the chains a discovery run would reconcile
    ListChains,
    /// Show the resolved table roots of a chain
    ListTables {
        /// Chain name (btc) or identity (v1.1/ton)
        chain: String,
    },
    /// Show crawl job specs for a chain without touching the catalog
    Plan {
        /// Chain name (btc) or identity (v1.1/ton)
        chain: String,
    },
    /// Start a crawl job
    TriggerJob {
        /// Crawl job name
        name: String,
    },
    /// Show the state of a crawl job
    JobStatus {
        /// Crawl job name
        name: String,
    },
    /// Post-process a finished crawl job
    Complete {
        #[arg(long)]
        job_id: String,
        #[arg(long)]
        namespace: String,
        /// Crawled location (s3://bucket/path/)
        #[arg(long)]
        table_root: String,
        /// The crawl job failed
        #[arg(long)]
        failed: bool,
    },
}

#[cfg(feature = "cli")]
fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let global = GlobalArgs {
        config: cli.config,
        bucket: cli.bucket,
        region: cli.region,
    };

    let result = match cli.command {
        Commands::Discover { output } => handle_discover(&DiscoverArgs { global, output }),
        Commands::ListChains => handle_list_chains(&global),
        Commands::ListTables { chain } => handle_list_tables(&global, &chain),
        Commands::Plan { chain } => handle_plan(&global, &chain),
        Commands::TriggerJob { name } => handle_trigger_job(&global, &name),
        Commands::JobStatus { name } => handle_job_status(&global, &name),
        Commands::Complete {
            job_id,
            namespace,
            table_root,
            failed,
        } => handle_complete(&CompleteArgs {
            global,
            job_id,
            namespace,
            table_root,
            failed,
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
