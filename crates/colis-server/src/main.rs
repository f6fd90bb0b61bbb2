//! # colis-server
//!
//! HTTP API server for the Colis parcel-delivery administration system.
//!
//! This binary provides:
//! - **REST API** (axum) for clients, delivery agents and administrators:
//!   account registration and login, parcel creation and tracking,
//!   assignment, status updates and shipment-note downloads
//! - **SQLite persistence** through the `colis-store` crate
//! - **Token-protected admin endpoints** for statistics and maintenance

mod api;
mod config;
mod error;
mod mail;
mod pdf;
mod sessions;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use colis_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::mail::LogMailer;
use crate::pdf::PdfRenderer;
use crate::sessions::SessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,colis_server=debug")),
        )
        .init();

    info!("Starting Colis server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    info!(
        instance = %config.instance_name,
        registration_open = config.registration_open,
        admin_enabled = config.admin_token.is_some(),
        "Instance settings"
    );

    // -----------------------------------------------------------------------
    // 3. Open the database (runs migrations on startup)
    // -----------------------------------------------------------------------
    let db = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    match db.path() {
        Some(path) => info!(path = %path.display(), "Database ready"),
        None => info!("Database ready (in memory)"),
    }

    // -----------------------------------------------------------------------
    // 4. Assemble application state
    // -----------------------------------------------------------------------
    let app_state = AppState {
        db: Arc::new(Mutex::new(db)),
        sessions: SessionStore::new(),
        renderer: Arc::new(PdfRenderer),
        mailer: Arc::new(LogMailer),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    // tokio::select! ensures that if either the HTTP server or a shutdown
    // signal arrives, we exit cleanly.
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    info!("Server stopped");
    Ok(())
}
