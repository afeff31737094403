// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::data_server::DataServerRegistry;
use crate::application::fetch_coordinator::FetchCoordinator;
use crate::infrastructure::config::load_config;
use crate::infrastructure::http_data_server::HttpDataServer;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    chart_guide, chart_legend, chart_title, delete_chart, health_check, render_chart, resize_chart,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config().context("Failed to load configuration")?;

    // Data servers (infrastructure layer)
    let client = reqwest::Client::new();
    let mut registry = DataServerRegistry::new();
    for server in &config.data_servers {
        tracing::info!(id = %server.id, url = %server.url, "Registering data server");
        registry.register(
            server.id.clone(),
            Arc::new(HttpDataServer::new(server.id.clone(), &server.url, client.clone())),
        );
    }
    if registry.is_empty() {
        tracing::warn!("No data servers configured; every render will fail");
    }

    // Coordinator and sessions (application layer)
    let coordinator = FetchCoordinator::new(Arc::new(registry));
    let state = Arc::new(AppState::new(
        coordinator,
        config.render,
        config.server.default_height,
        Duration::from_secs(config.server.session_idle_secs),
    ));
    let idle_sweep = Duration::from_secs(config.server.session_idle_secs.clamp(1, 60));
    state.spawn_idle_sweeper(idle_sweep);

    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/charts/:id", axum::routing::delete(delete_chart))
        .route("/charts/:id/render", post(render_chart))
        .route("/charts/:id/resize", post(resize_chart))
        .route("/charts/:id/guide", get(chart_guide))
        .route("/charts/:id/legend", post(chart_legend))
        .route("/charts/:id/title", post(chart_title))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind))?;
    tracing::info!("Starting chartline on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
