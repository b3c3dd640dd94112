//! CRM API - Sales CRM backend
//!
//! Leads, deals, activities, tasks and meeting bookings behind a JWT-secured
//! REST API. Deals drive their lead through the sales lifecycle: opening,
//! moving and deleting a deal updates the lead's status in the same step.
//!
//! Data lives in PostgreSQL when `DATABASE_URL` is set and in memory
//! otherwise. Redis is required at startup and reported by `/health`.

mod auth;
mod cache;
mod config;
mod db;
mod error;
mod lifecycle;
mod middleware;
mod models;
mod routes;
mod state;

use crate::cache::Cache;
use crate::config::Settings;
use crate::routes::create_router;
use crate::state::AppState;
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting CRM API...");

    // Load configuration
    let settings = Settings::load().context("Failed to load configuration")?;
    info!("📋 Configuration loaded ({})", settings.server.environment);

    let store = db::init_store(settings.database.as_ref())
        .await
        .context("Failed to initialize datastore")?;

    let cache = match Cache::connect(&settings.redis).await {
        Ok(cache) => cache,
        Err(e) => {
            error!("❌ FATAL: Failed to connect to Redis: {}", e);
            return Err(e).context("Cannot start server without Redis");
        }
    };

    let state = Arc::new(AppState::new(store, Some(cache), &settings));

    // Build the router
    let app = create_router(state, &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("📚 API Endpoints:");
    info!("   ─── Authentication ───");
    info!("   POST /api/auth/register        - Register new account");
    info!("   POST /api/auth/login           - Login with email/password");
    info!("   POST /api/auth/refresh         - Refresh access token");
    info!("   GET  /api/auth/me              - Get current user");
    info!("   ─── Sales ───");
    info!("   /api/leads, /api/deals         - Leads and their deals");
    info!("   /api/activities, /api/tasks    - Activity log and follow-ups");
    info!("   /api/bookings                  - Meeting bookings");
    info!("   /api/dashboard/overview        - Personal dashboard");
    info!("   ─── Administration ───");
    info!("   /api/users                     - User management");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging.
///
/// `LOG_FORMAT=json` switches to one JSON object per line.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,crm_api=debug,tower_http=debug"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .compact(),
            )
            .init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
