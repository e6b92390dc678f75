// Loadbench benchmark service
// Decision: The process only starts serving once the connection pool is up
// Decision: Graceful shutdown (SIGINT/SIGTERM) drains the pool; /crash skips all of it

use std::sync::Arc;

use anyhow::{Context, Result};
use loadbench_core::telemetry::{init_telemetry, TelemetryConfig};
use loadbench_server::{
    build_app, AppState, CrashTrigger, HttpMetrics, ProcessClock, ResourcePool, ServerConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Optional .env for local runs
    dotenvy::dotenv().ok();

    // Configure via environment variables:
    // - RUST_LOG or LOG_LEVEL: Log filter (default: "loadbench_server=debug,tower_http=info")
    // - LOG_FORMAT: "text" or "json"
    init_telemetry(
        TelemetryConfig::from_env()
            .with_service_name("loadbench-server")
            .with_default_filter("loadbench_server=debug,tower_http=info"),
    );

    tracing::info!("loadbench-server starting...");

    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        pool = ?config.pool,
        query_timeout_ms = config.query_timeout.as_millis() as u64,
        api_prefix = %config.api_prefix,
        "Configuration loaded"
    );

    // A broken pool is fatal: never start serving without it
    let pool = match ResourcePool::connect(&config.pool).await {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            tracing::error!(error = %e, "Startup failed, database unreachable");
            return Err(e).context("Failed to initialize connection pool");
        }
    };

    let metrics = Arc::new(HttpMetrics::new().context("Failed to create metrics registry")?);

    if config.cors_allowed_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
    } else {
        tracing::info!(origins = ?config.cors_allowed_origins, "CORS origins configured");
    }

    let clock = ProcessClock::start();
    let state = AppState::new(
        pool.clone(),
        clock,
        metrics,
        CrashTrigger::process_exit(),
        config.query_timeout,
    );
    let app = build_app(state, &config.api_prefix, &config.cors_allowed_origins);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("HTTP server listening on {}", config.bind_addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    pool.shutdown().await;
    tracing::info!(
        uptime_seconds = clock.uptime().as_secs_f64(),
        "Shutdown complete"
    );

    served
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Received shutdown signal");
}
