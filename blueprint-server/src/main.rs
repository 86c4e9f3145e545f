mod config;
use anyhow::Context;
use clap::{Parser, Subcommand};
use config::Config;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod server;
use blueprint_core::operations::{SweepOrphansOperation, SweepOrphansOperationRequest};
use server::{open_storage, run_server};

#[derive(Parser)]
#[command(name = "blueprint")]
#[command(about = "Versioned content store for shared blueprints")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Server {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Remove blobs that no revision refers to
    Sweep {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: String,

        /// Report what would be removed without touching anything
        #[arg(long)]
        dry_run: bool,

        /// Override the configured grace period, in seconds
        #[arg(long)]
        grace_period_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blueprint=info,blueprint_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server { config } => {
            tracing::info!("Starting Blueprint server with config: {}", config);

            let cfg = match Config::from_file(&config) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Failed to load config: {}", e);
                    std::process::exit(1);
                }
            };

            tracing::info!(
                "Bind: {}, data dir: {:?}, key attempts: {}",
                cfg.bind_addr,
                cfg.storage.data_dir,
                cfg.storage.key_attempts
            );

            if let Err(e) = run_server(cfg).await {
                tracing::error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Sweep {
            config,
            dry_run,
            grace_period_secs,
        } => {
            if let Err(e) = run_sweep(&config, dry_run, grace_period_secs).await {
                tracing::error!("Sweep failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

async fn run_sweep(
    config_path: &str,
    dry_run: bool,
    grace_period_secs: Option<u64>,
) -> anyhow::Result<()> {
    let cfg = Config::from_file(config_path)
        .with_context(|| format!("loading config from {}", config_path))?;
    let grace_period = grace_period_secs
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| cfg.sweep.grace_period());

    let (db, blob_store) = open_storage(&cfg).context("opening storage")?;
    let operation = SweepOrphansOperation::new(db, blob_store);

    let result = tokio::task::spawn_blocking(move || {
        operation.run(SweepOrphansOperationRequest {
            grace_period,
            dry_run,
        })
    })
    .await
    .context("sweep task panicked")?
    .context("sweeping blob tree")?;

    tracing::info!(
        "Orphans removed: {}, staging files removed: {}, deferred: {}, unrecognized: {}",
        result.orphaned_blobs_removed,
        result.staging_files_removed,
        result.orphans_deferred,
        result.unrecognized
    );

    Ok(())
}
