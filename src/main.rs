//! wantok server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use wantok::api;
use wantok::app_state::AppState;
use wantok::auth::UserDirectory;
use wantok::config::ServerConfig;
use wantok::domain::Hub;
use wantok::service::MessageService;
use wantok::store::MessageStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (also reads .env, so RUST_LOG can live there)
    let config = ServerConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(addr = %config.listen_addr, "starting wantok");

    // Build domain layer
    let directory = Arc::new(UserDirectory::new(config.users.clone()));
    if directory.is_empty() {
        tracing::warn!("USERS is empty; every request will be rejected");
    } else {
        tracing::info!(users = directory.len(), "user directory loaded");
    }
    let hub = Hub::spawn(config.hub);

    // Build service layer
    let store = Arc::new(MessageStore::new());
    let message_service = Arc::new(MessageService::new(
        store,
        Arc::clone(&directory),
        hub.clone(),
    ));

    // Build application state
    let app_state = AppState {
        hub,
        authenticator: directory,
        message_service,
        session: config.session,
    };

    let app = api::build_app(app_state, config.request_timeout);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
