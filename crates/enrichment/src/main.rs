//! Peptrack Enrichment CLI
//!
//! Runs one enrichment pass and exits:
//! 1. Loads and validates configuration
//! 2. Connects to the catalog database
//! 3. Enriches peptides or rescores vendors
//! 4. Prints the run summary as JSON

use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use peptrack_common::config::{AppConfig, ObservabilityConfig};
use peptrack_common::db::DbPool;
use peptrack_common::store::TargetSelector;
use peptrack_common::{metrics, CatalogStore, Repository, VERSION};
use peptrack_enrichment::Orchestrator;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "enrichment", version, about = "Peptrack evidence enrichment")]
struct Cli {
    /// Configuration file; defaults to config/{default,$APP_ENV,local}
    #[arg(long, short, env = "PEPTRACK_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enrich peptide profiles, safety, dosing, use cases and claims
    Peptides(RunArgs),
    /// Rescore vendor trust and refresh community claims
    Vendors(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Maximum number of entities to visit
    #[arg(long)]
    limit: Option<usize>,

    /// Only visit these slugs (repeatable)
    #[arg(long = "slug")]
    slugs: Vec<String>,

    /// Override the run deadline in seconds (0 disables it)
    #[arg(long)]
    deadline_secs: Option<u64>,
}

impl RunArgs {
    fn selector(&self) -> TargetSelector {
        TargetSelector {
            limit: self.limit,
            slugs: self.slugs.clone(),
        }
    }
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&str>) -> peptrack_common::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Configuration problems end the run before any entity is touched
    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&ObservabilityConfig::default());
            error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    init_tracing(&config.observability);
    info!("Starting Peptrack Enrichment v{}", VERSION);

    if config.observability.metrics_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        info!(%addr, "Metrics exporter listening");
    }
    metrics::register_metrics();

    let (kind, args) = match &cli.command {
        Command::Peptides(args) => ("peptides", args),
        Command::Vendors(args) => ("vendors", args),
    };
    if let Some(deadline) = args.deadline_secs {
        config.enrichment.run_deadline_secs = deadline;
    }

    let db = DbPool::new(&config.database).await?;
    let store: Arc<dyn CatalogStore> = Arc::new(Repository::new(db));
    let orchestrator = Orchestrator::from_config(store, &config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received Ctrl+C, finishing current entity");
                on_signal.cancel();
            }
            Err(e) => error!(error = %e, "Failed to install Ctrl+C handler"),
        }
    });

    let selector = args.selector();
    info!(kind, limit = ?selector.limit, slugs = selector.slugs.len(), "Starting run");
    let summary = match &cli.command {
        Command::Peptides(_) => orchestrator.run_peptides(&selector, cancel).await?,
        Command::Vendors(_) => orchestrator.run_vendors(&selector, cancel).await?,
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_peptide_run() {
        let cli = Cli::parse_from([
            "enrichment",
            "peptides",
            "--limit",
            "5",
            "--slug",
            "semaglutide",
            "--slug",
            "bpc-157",
        ]);
        let Command::Peptides(args) = cli.command else {
            panic!("expected peptides command");
        };
        let selector = args.selector();
        assert_eq!(selector.limit, Some(5));
        assert_eq!(selector.slugs, vec!["semaglutide", "bpc-157"]);
    }

    #[test]
    fn test_parses_vendor_run_with_config() {
        let cli = Cli::parse_from([
            "enrichment",
            "--config",
            "config/staging.toml",
            "vendors",
            "--deadline-secs",
            "0",
        ]);
        assert_eq!(cli.config.as_deref(), Some("config/staging.toml"));
        let Command::Vendors(args) = cli.command else {
            panic!("expected vendors command");
        };
        assert_eq!(args.deadline_secs, Some(0));
        assert!(args.selector().slugs.is_empty());
    }
}
