// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::application::session_registry::SessionRegistry;
use crate::infrastructure::config::load_dashboard_config;
use crate::infrastructure::databricks_repository::DatabricksRepository;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    dashboard_state, health_check, mount_dashboard, select_feature, show_dashboard,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feature_dashboard=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = load_dashboard_config()?;

    // Create repository (infrastructure layer)
    let repository = Arc::new(DatabricksRepository::new(&config.warehouse));

    // Create application state
    let state = Arc::new(AppState {
        sessions: SessionRegistry::new(repository),
        refresh_secs: config.server.refresh_secs,
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/", get(mount_dashboard))
        .route("/sessions/:id", get(show_dashboard))
        .route("/sessions/:id/state", get(dashboard_state))
        .route("/sessions/:id/panels/:panel", post(select_feature))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config.server.bind_addr.parse()?;
    tracing::info!("Starting feature-dashboard on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
