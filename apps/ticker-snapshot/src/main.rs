//! Ticker Snapshot Binary
//!
//! Starts the ticker feeds and the read API.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin ticker-snapshot
//! ```
//!
//! # Environment Variables
//!
//! - `PORT`: HTTP port for the read API and health routes (default: 80)
//! - `REDIS_URL`: Redis URL (default: unset, in-memory store)
//! - `TICKER_FEEDS`: Comma-separated markets (default: spot,futures)
//! - `TICKER_SPOT_URL` / `TICKER_FUTURES_URL`: Feed URLs (default: Binance)
//! - `TICKER_HEARTBEAT_INTERVAL_SECS`: Ping interval (default: 30)
//! - `TICKER_RECONNECT_DELAY_INITIAL_MS`: Backoff floor (default: 1000)
//! - `TICKER_RECONNECT_DELAY_MAX_MS`: Backoff ceiling (default: 30000)
//! - `TICKER_RECONNECT_DELAY_MULTIPLIER`: Backoff multiplier, at least 1.0 (default: 2.0)
//! - `TICKER_RECONNECT_JITTER`: Fraction of each delay randomized, 0.0 to 0.5 (default: 0.0)
//! - `TICKER_REDIS_TIMEOUT_MS`: Redis connect and response timeout (default: 5000)
//! - `TICKER_STORE_WRITES_ENABLED`: Write quotes to the store (default: true)
//! - `TICKER_KEY_PATTERN`: Pattern for listing quotes (default: *)
//! - `OTEL_ENABLED`: Enable OpenTelemetry export (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: ticker-snapshot)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures_util::future::join_all;
use ticker_snapshot::infrastructure::health::HealthState;
use ticker_snapshot::infrastructure::telemetry;
use ticker_snapshot::{
    ConnectionManager, FeedConfig, FeedHandle, InMemoryStore, KeyValueStore, QueryServer,
    RedisStore, ServiceConfig, SnapshotStore, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Ticker Snapshot");

    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Prometheus recorder unavailable, metrics disabled");
    }

    let config = ServiceConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let backend: Arc<dyn KeyValueStore> = match config.store.redis_url.as_deref() {
        Some(url) => Arc::new(
            RedisStore::connect(url, config.store.redis_timeout)
                .await
                .context("failed to connect to Redis")?,
        ),
        None => {
            tracing::warn!("REDIS_URL not set, using in-memory snapshot store");
            Arc::new(InMemoryStore::new())
        }
    };
    let store = SnapshotStore::with_key_pattern(backend, config.store.key_pattern.clone());

    let shutdown_token = CancellationToken::new();

    // Start one connection manager per configured market
    let feeds: Vec<FeedHandle> = config
        .feeds
        .iter()
        .map(|endpoint| {
            let feed_config =
                FeedConfig::from_settings(endpoint.market, endpoint.url.clone(), &config.feed);
            ConnectionManager::new(feed_config, store.clone(), shutdown_token.child_token())
                .start()
        })
        .collect();

    // Read API and health routes share one listener
    let health_state = Arc::new(HealthState::new(
        env!("CARGO_PKG_VERSION"),
        feeds.iter().map(FeedHandle::status).collect(),
    ));
    let server = QueryServer::new(
        config.server.port,
        store.clone(),
        health_state,
        shutdown_token.clone(),
    );
    let server_cancel = shutdown_token.clone();
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!(error = %e, "Query server error");
            server_cancel.cancel();
        }
    });

    tracing::info!(feeds = feeds.len(), "Ticker snapshot ready");

    await_shutdown(shutdown_token).await;

    for feed in &feeds {
        feed.stop();
    }

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        join_all(feeds.into_iter().map(FeedHandle::join)).await;
        let _ = server_task.await;
    })
    .await;

    if drained.is_err() {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Shutdown timed out before all tasks finished"
        );
    }

    drop(store);
    tracing::info!("Ticker snapshot stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &ServiceConfig) {
    tracing::info!(
        port = config.server.port,
        store = if config.store.redis_url.is_some() { "redis" } else { "memory" },
        key_pattern = %config.store.key_pattern,
        store_writes_enabled = config.feed.store_writes_enabled,
        heartbeat_secs = config.feed.heartbeat_interval.as_secs(),
        "Configuration loaded"
    );
    for endpoint in &config.feeds {
        tracing::debug!(market = %endpoint.market, url = %endpoint.url, "Feed endpoint");
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT) or an internal cancel.
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => {
            tracing::warn!("Internal failure, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
