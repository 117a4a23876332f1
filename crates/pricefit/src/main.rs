mod annotate;

use clap::{Args, Parser, Subcommand, ValueEnum};
use annotate::Price;
use pricefit_core::{DEFAULT_COST_ANNOTATION, DEFAULT_SCHEDULER_NAME};
use pricefit_scheduler::{ApiClient, ControlPlane, IngestStrategy, Scheduler, SchedulerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const DEFAULT_API_URL: &str = "http://127.0.0.1:8001";

#[derive(Parser)]
#[command(name = "pricefit", about = "Cost-aware pod scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Ingest {
    /// Long-lived watch on pending pods
    Watch,
    /// Periodic listing of pending pods
    Poll,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler
    Run(RunArgs),
    /// Tag nodes with random costs, or list their current costs
    Annotate {
        /// Control-plane base URL
        #[arg(long, env = "PRICEFIT_API_URL", default_value = DEFAULT_API_URL)]
        api_url: String,
        /// Node annotation holding the cost tag
        #[arg(long, env = "PRICEFIT_COST_ANNOTATION", default_value = DEFAULT_COST_ANNOTATION)]
        cost_annotation: String,
        /// Print the current cost of every node and exit
        #[arg(long)]
        list: bool,
        /// Comma-separated prices to pick from (defaults to 0.05,0.10,0.20,0.40,0.80,1.60)
        #[arg(long, value_delimiter = ',')]
        prices: Vec<Price>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Control-plane base URL
    #[arg(long, env = "PRICEFIT_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,
    /// Scheduler name pods ask for
    #[arg(long, env = "PRICEFIT_SCHEDULER_NAME", default_value = DEFAULT_SCHEDULER_NAME)]
    scheduler_name: String,
    /// Node annotation holding the cost tag
    #[arg(long, env = "PRICEFIT_COST_ANNOTATION", default_value = DEFAULT_COST_ANNOTATION)]
    cost_annotation: String,
    /// Component reported on events (defaults to "<scheduler-name>-scheduler")
    #[arg(long)]
    component: Option<String>,
    /// How pending pods are discovered
    #[arg(long, value_enum, default_value_t = Ingest::Watch)]
    ingest: Ingest,
    /// Seconds to wait before reopening a failed watch
    #[arg(long, default_value_t = 5)]
    reconnect_backoff_secs: u64,
    /// Seconds between pending-pod listings in poll mode
    #[arg(long, default_value_t = 30)]
    poll_interval_secs: u64,
}

impl RunArgs {
    fn scheduler_config(&self) -> SchedulerConfig {
        let ingest = match self.ingest {
            Ingest::Watch => IngestStrategy::Watch {
                reconnect_backoff: Duration::from_secs(self.reconnect_backoff_secs),
            },
            Ingest::Poll => IngestStrategy::Poll {
                interval: Duration::from_secs(self.poll_interval_secs),
            },
        };

        SchedulerConfig {
            scheduler_name: self.scheduler_name.clone(),
            cost_annotation: self.cost_annotation.clone(),
            component: self
                .component
                .clone()
                .unwrap_or_else(|| format!("{}-scheduler", self.scheduler_name)),
            ingest,
        }
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_scheduler(&args.api_url, args.scheduler_config()).await,
        Commands::Annotate {
            api_url,
            cost_annotation,
            list,
            prices,
        } => {
            let prices = if prices.is_empty() {
                default_prices()?
            } else {
                prices
            };
            annotate::run_annotate(&api_url, &cost_annotation, list, &prices).await
        }
    }
}

fn default_prices() -> miette::Result<Vec<Price>> {
    annotate::DEFAULT_PRICES
        .split(',')
        .map(|p| {
            p.parse::<Price>()
                .map_err(|e| miette::miette!("Invalid default price '{}': {}", p, e))
        })
        .collect()
}

/// Run the scheduler until SIGINT or SIGTERM
async fn run_scheduler(api_url: &str, config: SchedulerConfig) -> miette::Result<()> {
    info!(
        "Starting pricefit scheduler '{}' against {}",
        config.scheduler_name, api_url
    );

    let client = Arc::new(ApiClient::new(api_url));

    // First contact decides whether we can run at all
    let nodes = client
        .list_nodes()
        .await
        .map_err(|e| miette::miette!("Cannot reach control plane at {}: {}", api_url, e))?;
    info!("Connected to control plane, {} nodes visible", nodes.len());

    let token = CancellationToken::new();

    let scheduler = Scheduler::new(client, config);
    let scheduler_token = token.clone();
    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = scheduler.run(scheduler_token).await {
            error!("Scheduler error: {}", e);
        }
    });

    // Wait for shutdown signal
    shutdown_signal().await?;

    info!("Shutting down gracefully...");
    token.cancel();

    // An in-flight decision is allowed to finish
    let shutdown_timeout = Duration::from_secs(30);
    if tokio::time::timeout(shutdown_timeout, scheduler_handle)
        .await
        .is_err()
    {
        error!("Scheduler did not stop within {:?}", shutdown_timeout);
    }

    info!("Shutdown complete");

    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() -> miette::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .map_err(|e| miette::miette!("Failed to register SIGTERM handler: {}", e))?;
        tokio::select! {
            result = ctrl_c => {
                result.map_err(|e| miette::miette!("Failed to listen for ctrl-c: {}", e))?;
                info!("Received SIGINT");
            }
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c
            .await
            .map_err(|e| miette::miette!("Failed to listen for ctrl-c: {}", e))?;
    }

    Ok(())
}
