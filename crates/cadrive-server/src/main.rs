//! cadrive server - document vault for accounting practices
//!
//! Serves the drive API behind an upstream identity layer and runs the
//! recycle-bin purge and fiscal-year rollover on their schedules.

mod auth;
mod config;
mod sinks;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use cadrive::catalog::{Catalog, MemoryCatalog, MongoCatalog};
use cadrive::jobs;
use cadrive::registry::{ClientRegistry, MemoryClientRegistry, MongoClientRegistry};
use cadrive::routes::AppState;
use cadrive::storage::{MemoryStorage, ObjectStorage, S3Settings, S3Storage};
use cadrive::MongoDb;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::auth::principal_middleware;
use crate::config::{CatalogBackend, Config, StorageBackend};
use crate::sinks::{LogActivitySink, WebhookNotifier};

#[derive(Parser)]
#[command(name = "cadrive-server", version, about)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(long, env = "CADRIVE_CONFIG")]
    config: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Debug)]
enum Command {
    /// Serve the HTTP API and run scheduled jobs (default)
    Serve,
    /// Run one recycle-bin purge sweep and exit
    Purge,
    /// Refresh every client's folder tree for the current fiscal year and exit
    Rollover,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadrive_server=info,cadrive=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = match cli.config.as_deref() {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    let state = build_state(&config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, state).await,
        Command::Purge => {
            let report = jobs::run_purge(&state, chrono::Utc::now()).await?;
            info!(
                "Purge finished: {} documents, {} folders, {} objects, {} failures",
                report.documents, report.folders, report.objects_removed, report.failures
            );
            Ok(())
        }
        Command::Rollover => {
            let report = jobs::run_rollover(&state, chrono::Utc::now()).await?;
            info!(
                "Rollover finished: {} clients, {} folders created, {} failures",
                report.clients, report.folders_created, report.failures
            );
            Ok(())
        }
    }
}

async fn build_state(config: &Config) -> Result<Arc<AppState>> {
    let (catalog, registry): (Arc<dyn Catalog>, Arc<dyn ClientRegistry>) =
        match config.catalog_backend {
            CatalogBackend::MongoDB => {
                info!("Connecting to MongoDB: {}", config.database_url);
                let db = MongoDb::connect(&config.database_url, &config.database_name)
                    .await
                    .context("Failed to connect to MongoDB")?;
                (
                    Arc::new(MongoCatalog::new(db.clone())),
                    Arc::new(MongoClientRegistry::new(db)),
                )
            }
            CatalogBackend::Memory => {
                warn!("Using in-memory catalog; data is lost on exit");
                (
                    Arc::new(MemoryCatalog::new()),
                    Arc::new(MemoryClientRegistry::new()),
                )
            }
        };

    let storage: Arc<dyn ObjectStorage> = match config.storage_backend {
        StorageBackend::S3 => {
            info!("Using S3 storage at {}", config.s3_endpoint);
            Arc::new(S3Storage::new(&S3Settings {
                endpoint: config.s3_endpoint.clone(),
                region: config.s3_region.clone(),
                access_key: config.s3_access_key.clone(),
                secret_key: config.s3_secret_key.clone(),
            }))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory object storage; uploads are lost on exit");
            Arc::new(MemoryStorage::new())
        }
    };

    let mut state = AppState::new(catalog, storage, registry, config.drive.clone());
    state.activity_sink = Some(Arc::new(LogActivitySink));
    if let Some(url) = &config.notify_webhook_url {
        info!("Client notifications go to {}", url);
        state.notification_sink = Some(Arc::new(WebhookNotifier::new(url.clone())));
    }
    Ok(Arc::new(state))
}

async fn serve(config: Config, state: Arc<AppState>) -> Result<()> {
    let cancel = CancellationToken::new();
    let job_handles = jobs::spawn_drive_jobs(state.clone(), cancel.clone())?;

    let app = build_router(state, &config)?;
    let addr = SocketAddr::new(config.host.parse()?, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
            shutdown.cancel();
        })
        .await?;

    cancel.cancel();
    for handle in job_handles {
        let _ = handle.await;
    }
    Ok(())
}

fn build_router(state: Arc<AppState>, config: &Config) -> Result<Router> {
    let origins = config.cors_origins();
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let cors = if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        let values = origins
            .iter()
            .map(|o| HeaderValue::from_str(o).with_context(|| format!("Invalid CORS origin: {}", o)))
            .collect::<Result<Vec<_>>>()?;
        cors.allow_origin(values)
    };

    let public_routes = Router::new()
        .route("/health", get(health_check))
        .with_state(state.clone());

    let drive_routes = cadrive::routes::configure(state)
        .layer(axum::middleware::from_fn(principal_middleware));

    Ok(Router::new()
        .merge(public_routes)
        .nest("/api/drive", drive_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors))
}

async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.catalog.ping().await {
        Ok(()) => Ok(Json(serde_json::json!({
            "status": "healthy",
            "catalog": "connected",
            "version": env!("CARGO_PKG_VERSION")
        }))),
        Err(e) => {
            warn!("Health check failed: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
