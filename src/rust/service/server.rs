//! Tagging Service Server

use std::io;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use log::{error, info};

use super::handlers::{self, HandlerState};
use crate::tagger::TaggingPipeline;

/// HTTP server exposing a [`TaggingPipeline`]
pub struct TaggerServer {
    pipeline: Arc<TaggingPipeline>,
}

impl TaggerServer {
    pub fn new(pipeline: Arc<TaggingPipeline>) -> Self {
        Self { pipeline }
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.pipeline))
    }

    /// Binds `addr` and serves until Ctrl-C or SIGTERM
    pub async fn serve(self, addr: &str) -> io::Result<()> {
        let router = self.router();

        let listener = TcpListener::bind(addr).await?;
        info!("Serving on http://{}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

pub fn build_router(pipeline: Arc<TaggingPipeline>) -> Router {
    let state = Arc::new(HandlerState::new(pipeline));

    Router::new()
        .route("/tagger", post(handlers::tag_handler))
        .route("/health", get(handlers::health_handler))
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining connections");
}
