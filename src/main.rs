use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use spyhop::{
    config::AppConfig,
    http_server::{ApiState, run_server},
    persistence::{sqlite::SqliteRepository, traits::AppRepository},
    pipeline::Pipeline,
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration directory (expects app.yaml inside).
    #[arg(short, long)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the HTTP trigger surface.
    Serve,
    /// Polls one wallet, or all wallets, then classifies and dispatches.
    Poll {
        /// Address of a single wallet to poll.
        address: Option<String>,
    },
    /// Dispatches one alert by id.
    Dispatch {
        /// The alert to dispatch.
        alert_id: i64,
        /// Deliver without mutating the alert or recording attempts.
        #[arg(long)]
        test_mode: bool,
    },
    /// Runs one health sweep.
    HealthSweep,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let cli = Cli::parse();

    tracing::debug!("Loading application configuration...");
    let config = AppConfig::new(cli.config_dir.as_deref())?;

    let repo = Arc::new(SqliteRepository::connect(&config.database_url).await?);
    repo.run_migrations().await?;
    repo.sync_wallets(&config.wallets).await?;
    tracing::info!(wallets = config.wallets.len(), "Store ready, wallet registry synced.");

    let pipeline = Arc::new(Pipeline::bootstrap(&config, Arc::clone(&repo)).await?);

    match cli.command {
        Commands::Serve => {
            let state = ApiState {
                pipeline,
                started_at: Instant::now(),
            };
            run_server(&config.server, state).await?;
        }
        Commands::Poll { address } => {
            let report = pipeline.run_poll_cycle(address.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Dispatch {
            alert_id,
            test_mode,
        } => {
            let result = pipeline.dispatch_alert(alert_id, test_mode).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::HealthSweep => {
            let report = pipeline.run_health_sweep().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
