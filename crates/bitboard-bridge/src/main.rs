//! BitBoard bridge host.
//!
//! - WebSocket endpoint: /v1/bridge (one embedded content instance per socket)
//! - Config from `BITBOARD_CONFIG` (default `bitboard.yaml`)
//! - Tracing span per session
//! - Heartbeat ping + idle timeout

use std::net::SocketAddr;

use tracing_subscriber::{fmt, EnvFilter};

use bitboard_bridge::{app_state, config, http};
use bitboard_core::error::{BridgeError, Result};

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, code = e.client_code().as_str(), "bitboard-bridge failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = config::config_path();
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg
        .bridge
        .listen
        .parse()
        .map_err(|e| BridgeError::Config(format!("bridge.listen must be a socket address: {e}")))?;

    let state = app_state::AppState::new(cfg)?;
    let app = http::build_router(state);

    tracing::info!(%listen, config = %path, "bitboard-bridge starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| BridgeError::Internal(format!("bind {listen} failed: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| BridgeError::Internal(format!("server failed: {e}")))
}
