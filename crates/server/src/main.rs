mod bootstrap;
mod chat;
mod health;
mod sessions;

use std::time::Duration;

use anyhow::Result;
use axum::Router;
use dinebot_core::config::{AppConfig, LoadOptions};
use tracing::info;

fn init_logging(config: &AppConfig) {
    use dinebot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Config first: logging format and level come from it.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let router = Router::new()
        .merge(chat::router(chat::ChatState {
            runtime: app.runtime.clone(),
            sessions: app.sessions.clone(),
        }))
        .merge(health::router(app.config.executor.base_url.clone(), app.sessions.clone()));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.server.started",
        bind_address = %address,
        executor_base_url = %app.config.executor.base_url,
        "dinebot-server started"
    );

    let shutdown_grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_grace))
        .await?;

    info!(event_name = "system.server.stopped", "dinebot-server stopped");

    Ok(())
}

async fn wait_for_shutdown(grace: Duration) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    info!(
        event_name = "system.server.stopping",
        grace_secs = grace.as_secs(),
        "shutdown signal received, draining in-flight requests"
    );
}
