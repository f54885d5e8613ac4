//! Mailtrail web server.
//!
//! Serves the dispatch endpoints (bulk and test send) and the two
//! tracking endpoints (open pixel, click redirect). State is backed by
//! the bundled in-memory store and token authenticator; deployments
//! integrating a relational store swap their own `CrmStore` and
//! `Authenticator` into [`AppState`].

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mailtrail::auth::{Authenticator, Caller, StaticAuthenticator};
use mailtrail::mailer::{MailTransportFactory, SmtpMailerFactory};
use mailtrail::store::{CrmStore, MemoryStore};
use mailtrail::web::{router, AppState};
use mailtrail::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        public_base_url = %config.public_base_url,
        default_from_name = %config.default_from_name,
        admin_token_configured = config.admin_api_token.is_some(),
        "config_loaded"
    );

    let mut auth = StaticAuthenticator::new();
    if let Some(token) = &config.admin_api_token {
        auth = auth.with_token(token.clone(), Caller::admin("admin"));
    }

    let state = AppState::new(
        config.clone(),
        Arc::new(MemoryStore::new()) as Arc<dyn CrmStore>,
        Arc::new(auth) as Arc<dyn Authenticator>,
        Arc::new(SmtpMailerFactory) as Arc<dyn MailTransportFactory>,
    );

    // Build the router
    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
