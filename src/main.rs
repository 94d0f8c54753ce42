//! Application entry point.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::SecretString;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use airdrop_engine::api::create_router;
use airdrop_engine::app::{AppState, EngineConfig, WorkerConfig, spawn_worker};
use airdrop_engine::domain::normalize_address;
use airdrop_engine::infra::{
    LedgerGatewayClient, LedgerGatewayConfig, PostgresConfig, PostgresStore,
};

/// Application configuration
struct Config {
    database_url: String,
    ledger_gateway_url: String,
    ledger_api_key: Option<SecretString>,
    funding_address: String,
    host: String,
    port: u16,
    engine: EngineConfig,
    enable_background_worker: bool,
    worker_config: WorkerConfig,
}

impl Config {
    fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;
        let ledger_gateway_url =
            env::var("LEDGER_GATEWAY_URL").context("LEDGER_GATEWAY_URL not set")?;
        let ledger_api_key = env::var("LEDGER_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .map(SecretString::from);

        let funding_address = env::var("FUNDING_ADDRESS").context("FUNDING_ADDRESS not set")?;
        let funding_address = normalize_address(&funding_address)
            .map_err(|e| anyhow::anyhow!("Invalid FUNDING_ADDRESS: {e}"))?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let enable_background_worker = env::var("ENABLE_BACKGROUND_WORKER")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        let worker_poll_interval_secs = env::var("WORKER_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);

        let worker_config = WorkerConfig {
            enabled: enable_background_worker,
            poll_interval: Duration::from_secs(worker_poll_interval_secs),
        };

        Ok(Self {
            database_url,
            ledger_gateway_url,
            ledger_api_key,
            funding_address,
            host,
            port,
            engine: EngineConfig::from_env(),
            enable_background_worker,
            worker_config,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    info!("🪂 Airdrop Engine v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    info!("📦 Initializing infrastructure...");

    // Initialize database
    let store = PostgresStore::new(&config.database_url, PostgresConfig::default()).await?;
    store.run_migrations().await?;
    info!("   ✓ Database connected and migrations applied");

    // Initialize ledger gateway client
    let mut ledger_config =
        LedgerGatewayConfig::new(&config.ledger_gateway_url, &config.funding_address);
    if let Some(key) = config.ledger_api_key.clone() {
        ledger_config = ledger_config.with_api_key(key);
    }
    let ledger = LedgerGatewayClient::new(ledger_config)?;
    info!(
        "   ✓ Ledger gateway client created (funding account: {})",
        config.funding_address
    );

    // Create application state with explicitly injected clients
    let app_state = Arc::new(AppState::new(
        Arc::new(store),
        Arc::new(ledger),
        config.engine.clone(),
    ));

    // Start the execution worker: the single scheduler that serializes
    // batch invocations against the funding account
    let worker_shutdown_tx = if config.enable_background_worker {
        let (_worker_handle, shutdown_tx) = spawn_worker(
            Arc::clone(&app_state.executor),
            config.worker_config.clone(),
        );
        info!(
            "   ✓ Execution worker started (poll: {}s, batch: {})",
            config.worker_config.poll_interval.as_secs(),
            config.engine.batch_size
        );
        Some(shutdown_tx)
    } else {
        info!("   ○ Execution worker disabled");
        None
    };

    let router = create_router(app_state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("🚀 Server starting on http://{}", addr);
    info!("📖 Swagger UI available at http://{}/swagger-ui", addr);
    info!("📄 OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Signal worker to shutdown
    if let Some(tx) = worker_shutdown_tx {
        let _ = tx.send(true);
    }

    info!("Server shutdown complete");
    Ok(())
}
