//! Peptrack API Gateway
//!
//! HTTP surface of the enrichment pipeline.
//! Handles:
//! - Health and readiness probes
//! - Enrichment run triggers (one run at a time)
//! - Published peptide and vendor reads
//! - Rate limiting and observability (request ids, tracing, metrics)

mod handlers;
mod middleware;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use peptrack_common::{
    config::{AppConfig, ObservabilityConfig},
    db::DbPool,
    metrics, CatalogStore, Repository,
};
use peptrack_enrichment::Orchestrator;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, Subscriber};
use tracing_subscriber::{fmt::MakeWriter, util::SubscriberInitExt, EnvFilter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn CatalogStore>,
    pub orchestrator: Arc<Orchestrator>,
    /// Held for the duration of an enrichment run
    pub run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn CatalogStore>, orchestrator: Orchestrator) -> Self {
        Self {
            config: Arc::new(config),
            store,
            orchestrator: Arc::new(orchestrator),
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Log subscriber honoring the configured level and output format
fn build_subscriber<W>(config: &ObservabilityConfig, writer: W) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(writer);
    if config.json_logging {
        Box::new(builder.json().finish())
    } else {
        Box::new(builder.finish())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load_validated();

    // Initialize tracing
    let observability = config
        .as_ref()
        .map(|c| c.observability.clone())
        .unwrap_or_default();
    build_subscriber(&observability, std::io::stdout).try_init()?;

    info!("Starting Peptrack API Gateway v{}", peptrack_common::VERSION);

    let config = config.map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    // Initialize metrics
    if config.observability.metrics_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        info!(%addr, "Metrics exporter listening");
    }
    metrics::register_metrics();

    // Initialize database connection
    let db = DbPool::new(&config.database).await?;
    let store: Arc<dyn CatalogStore> = Arc::new(Repository::new(db));
    let orchestrator = Orchestrator::from_config(Arc::clone(&store), &config)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = AppState::new(config, store, orchestrator);

    // Build the router
    let app = create_router(state);

    // Start the server
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let limits = &state.config.rate_limit;
    let limiter = limits.enabled.then(|| {
        middleware::rate_limit::create_rate_limiter(limits.requests_per_second, limits.burst)
    });

    // API routes
    let mut api_routes = Router::new()
        // Enrichment triggers
        .route("/enrichment/peptides", post(handlers::enrichment::run_peptides))
        .route("/enrichment/vendors", post(handlers::enrichment::run_vendors))
        // Published catalog reads
        .route("/peptides/{slug}", get(handlers::catalog::get_peptide))
        .route("/vendors/{slug}", get(handlers::catalog::get_vendor));

    if let Some(limiter) = limiter {
        api_routes = api_routes.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Compose the app
    Router::new()
        // Health endpoints (not rate limited)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(axum_middleware::from_fn(middleware::track_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors),
        )
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
