//! Repo Rhythm Exporter
//!
//! This crate provides the HTTP server and beat scheduler of the Repo Rhythm
//! exporter. It polls the GitHub GraphQL API for one repository and exposes
//! the results as Prometheus metrics.
//!
//! # Architecture
//!
//! The exporter is built on Axum and Tokio, providing:
//! - One background task per beat, each on its own interval
//! - `GET /metrics` in the Prometheus text exposition format
//! - `GET /health` for liveness checks
//!
//! # Example
//!
//! ```no_run
//! use api::run_server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
mod exporter;
mod routes;
mod scheduler;
mod state;

pub use config::{Config, ConfigError};
pub use exporter::{Exporter, ExporterError, METRIC_PREFIX};
pub use scheduler::{BeatRunner, Scheduler, SchedulerError, SchedulerMetrics};
pub use state::AppState;

use anyhow::Result;
use axum::Router;
use shared::github::GithubClient;
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Runs the Repo Rhythm exporter.
///
/// This function initializes the exporter with configuration from environment
/// variables, starts every beat and serves metrics until a shutdown signal
/// arrives. It handles graceful shutdown on SIGTERM/SIGINT signals.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - The server fails to bind to the configured address
/// - A beat fails fatally
pub async fn run_server() -> Result<()> {
    let config = Config::from_env()?;
    run_server_with_config(config).await
}

/// Runs the Repo Rhythm exporter with the provided configuration.
///
/// This is useful for testing or when you want to provide configuration programmatically.
///
/// # Errors
///
/// Returns an error if:
/// - The GitHub client cannot be created
/// - The server fails to bind to the configured address
/// - A beat fails fatally
pub async fn run_server_with_config(config: Config) -> Result<()> {
    let addr = config.socket_addr()?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        target = %config.target,
        github_url = %config.github_url,
        "Repo Rhythm exporter starting"
    );

    let transport = Arc::new(GithubClient::new(config.github_url.clone(), &config.github_token)?);
    let exporter = Exporter::build(&config, transport)?;

    let app = create_router(exporter.state());
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Listening for connections");

    let mut scheduler = exporter.start();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

    let outcome = tokio::select! {
        result = server => Ok(result),
        err = scheduler.failed() => Err(err),
    };
    scheduler.shutdown().await;

    match outcome {
        Ok(result) => {
            result?;
            tracing::info!("Server shutdown complete");
            Ok(())
        }
        Err(err) => {
            tracing::error!(error = %err, "Stopping exporter after fatal beat failure");
            Err(err.into())
        }
    }
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a full server.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes(state.clone()))
        .merge(routes::metrics_routes(state))
        .layer(TraceLayer::new_for_http())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
