//! Fragment server
//!
//! Serves the component templates the runtime fetches, plus the search
//! collections behind `<app-rich-select endpoint="...">`.

pub mod api;
mod error;

pub use error::ApiError;

use crate::config::Config;
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared state for handlers
#[derive(Debug, Clone)]
pub struct ServerState {
    pub components_dir: Arc<PathBuf>,
    pub data_dir: Arc<PathBuf>,
    pub search_limit: usize,
}

impl ServerState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            components_dir: Arc::new(config.components_dir.clone()),
            data_dir: Arc::new(config.data_dir.clone()),
            search_limit: config.search_limit,
        }
    }
}

/// Build the router
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/components/:kind/:name/:file", get(api::component_file))
        .route("/api/search/:collection", get(api::search))
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown_rx` fires
pub async fn serve(
    listener: TcpListener,
    state: ServerState,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown_rx.await.ok();
        })
        .await
        .context("Server error")?;

    tracing::info!("Fragment server shut down gracefully");
    Ok(())
}

/// Start the fragment server
pub async fn start_server(
    config: &Config,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<()> {
    let bind_addr = config.bind_addr;
    let state = ServerState::from_config(config);

    tracing::info!(
        "Serving components from {} and data from {}",
        state.components_dir.display(),
        state.data_dir.display()
    );

    // Bind and serve
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {bind_addr}"))?;

    tracing::info!("Fragment server listening on {}", bind_addr);

    serve(listener, state, shutdown_rx).await
}
