//! # HTTP API
//!
//! axum router for the backup/restore endpoints and the static frontend.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET  | `/backup` | stream a fresh archive of all databases |
//! | GET  | `/backup/verify` | compare a client checksum with a kept archive |
//! | GET  | `/backup/status` | existence and size of every database |
//! | POST | `/restore` | single or chunked archive upload, then restore |
//! | GET  | `/operation/status/{upload_id}` | progress of a restore |
//! | GET  | anything else | files from the public directory |

mod backup;
mod error;
mod restore;

pub use error::ApiError;

use crate::config::ServerConfig;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use bookvault_core::OperationRegistry;
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Registry shared between handlers and cleanup tasks.
pub type SharedRegistry = Arc<Mutex<OperationRegistry>>;

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub operations: SharedRegistry,
}

impl AppState {
    /// Create state with an empty operation registry.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            operations: Arc::new(Mutex::new(OperationRegistry::new())),
        }
    }

    /// Lock the operation registry.
    ///
    /// The guard must not be held across an `.await`.
    pub fn registry(&self) -> Result<MutexGuard<'_, OperationRegistry>, ApiError> {
        self.operations
            .lock()
            .map_err(|_| ApiError::internal("Operation registry unavailable"))
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.config.public_dir).append_index_html_on_directories(true);
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/backup", get(backup::download_handler))
        .route("/backup/verify", get(backup::verify_handler))
        .route("/backup/status", get(backup::status_handler))
        .route(
            "/restore",
            post(restore::restore_handler).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/operation/status/{upload_id}",
            get(restore::operation_status_handler),
        )
        .fallback_service(static_files)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Bind and serve until Ctrl-C or SIGTERM.
pub async fn serve(config: ServerConfig) -> std::io::Result<()> {
    config.prepare()?;
    let bind = config.bind;
    let state = AppState::new(config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, "Bookvault server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Bookvault server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("Shutdown signal received");
}
