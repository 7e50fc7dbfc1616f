pub mod app;
pub mod csrf;
pub mod handlers;
pub mod middleware;

pub use app::{create_app, AppState};

use crate::config::Config;
use crate::error::{AppError, ServerError};
use std::net::SocketAddr;
use std::str::FromStr;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

/// Run the server with an already finalized configuration
pub async fn run_server(config: Config) -> Result<(), AppError> {
    let addr = SocketAddr::from_str(&format!("{}:{}", config.server.host, config.server.port))
        .map_err(|e| ServerError::StartupError(format!("invalid server address: {}", e)))?;

    info!("Environment: {}", config.server.environment);
    info!("Organization: {}", config.github.org);
    info!("GitHub API: {}", config.github.api_base());

    let app_state = AppState::new(config).await?;
    info!("Application state initialized");

    let app = create_app(app_state);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ServerError::BindError {
            address: addr.to_string(),
            source: e,
        })?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::StartupError(format!("server error: {}", e)))?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
