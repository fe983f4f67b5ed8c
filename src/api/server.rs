use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::errors::{AglbError, Result};

use super::routes::{build_router, ApiState};

/// Serve the API until ctrl-c
pub async fn start_api_server(config: &ServerConfig, state: ApiState) -> Result<()> {
    let addr: SocketAddr = config.bind_address().parse().map_err(|e| {
        AglbError::config_with_source(
            format!("Invalid API address '{}'", config.bind_address()),
            Box::new(e),
        )
    })?;

    let router = build_router(state, config);

    let listener = TcpListener::bind(addr).await.map_err(|e| AglbError::Io {
        source: e,
        context: format!("Failed to bind API server to {}", addr),
    })?;

    info!(address = %addr, "Starting HTTP API server");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "API server shutdown listener failed");
            }
        })
        .await
        .map_err(|e| AglbError::Io { source: e, context: "API server error".to_string() })?;

    info!("API server shutdown completed");
    Ok(())
}
