//! todoguard API server

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use todoguard_api::{create_router, AppState};
use todoguard_core::{AppConfig, LoggingConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = load_config()?;
    init_tracing(&config.logging);

    tracing::info!(environment = %config.environment, "Starting todoguard API");
    config.validate().context("Invalid configuration")?;

    let store = todoguard_core::connect(&config.database)
        .await
        .context("Failed to open store")?;
    tracing::info!(backend = store.backend_name(), "Store ready");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let serves_docs = config.environment.serves_docs();

    let state = Arc::new(AppState::new(config, store)?);
    spawn_limiter_cleanup(state.clone());

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("todoguard API listening on http://{}", addr);
    if serves_docs {
        tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Defaults, then `CONFIG_FILE`, then environment, then `SECRETS_FILE`
fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::var("CONFIG_FILE") {
        Ok(path) => AppConfig::from_file(&path)
            .with_context(|| format!("Failed to load config file {path}"))?
            .with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };

    let config = match std::env::var("SECRETS_FILE") {
        Ok(path) => config
            .with_secrets_file(&path)
            .with_context(|| format!("Failed to load secrets file {path}"))?,
        Err(_) => config,
    };

    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "todoguard_api={level},todoguard_core={level},audit=info,tower_http=info",
            level = logging.level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(logging.include_location)
                    .with_line_number(logging.include_location),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_file(logging.include_location)
                    .with_line_number(logging.include_location),
            )
            .init();
    }
}

/// Periodically drop idle rate-limit buckets
fn spawn_limiter_cleanup(state: Arc<AppState>) {
    let period = Duration::from_secs(state.config.throttle.ttl_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            state.rate_limiter.retain_recent();
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
