//! monrelay server.
//!
//! - Event intake: `POST /` (CloudEvents, binary or structured mode)
//! - Protocol introspection: `GET /protocol`
//! - Metrics: `GET /v1/metrics`
//! - Liveness: `GET /live`

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use monrelay_core::error::{RelayError, Result};
use monrelay_gateway::{app_state, config, model::ScoreModel, router};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = config::load_from_env()?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.server.log_level.as_str()));
    fmt().with_env_filter(filter).init();

    let listen: SocketAddr = cfg
        .server
        .listen()
        .parse()
        .map_err(|e| RelayError::Config(format!("invalid listen address: {e}")))?;

    let state = app_state::AppState::new(cfg, Arc::new(ScoreModel::new()))?;
    tracing::info!(
        protocol = %state.protocol(),
        model = %state.model_name(),
        namespace = %state.cfg().metrics.deployment_namespace,
        "monrelay configured"
    );
    let app = router::build_router(state);

    tracing::info!(%listen, "monrelay listening");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| RelayError::Internal(format!("failed to bind {listen}: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RelayError::Internal(format!("server failed: {e}")))?;

    tracing::info!("monrelay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
}
