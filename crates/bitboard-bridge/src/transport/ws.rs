//! WebSocket host for one embedded content instance.
//!
//! - Upgrade HTTP -> WS at `/v1/bridge`
//! - One [`BridgeRouter`](crate::router::BridgeRouter) per socket
//! - Text frames are request envelopes; outbound frames are `kind`-tagged JSON
//! - Lifecycle: ping + idle timeout

use std::sync::Arc;

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, State},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

use bitboard_core::error::Result;

use crate::app_state::AppState;
use crate::sink::ChannelSink;

pub async fn ws_upgrade(State(app): State<AppState>, ws: WebSocketUpgrade) -> Response {
    app.metrics().ws_upgrades.inc(&[]);
    ws.on_upgrade(move |socket| async move {
        let span = tracing::info_span!("bridge_session", session = %Uuid::new_v4());
        async move {
            let metrics = app.metrics();
            metrics.ws_active_sessions.inc(&[]);
            tracing::info!("content attached");
            if let Err(e) = run_session(app, socket).await {
                tracing::warn!(error = %e, "session ended with error");
            }
            metrics.ws_active_sessions.dec(&[]);
            tracing::info!("content detached");
        }
        .instrument(span)
        .await
    })
}

async fn run_session(app: AppState, socket: WebSocket) -> Result<()> {
    let cfg = &app.cfg().bridge;
    let (sink, mut out_rx) = ChannelSink::channel(cfg.outbound_queue);
    let router = app.new_router(Arc::new(sink));

    let (mut ws_tx, mut ws_rx) = socket.split();

    let ping_every = Duration::from_millis(cfg.ping_interval_ms);
    let idle_timeout = Duration::from_millis(cfg.idle_timeout_ms);

    let mut ping_tick = tokio::time::interval(ping_every);
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut last_activity = Instant::now();

    let outcome = loop {
        tokio::select! {
            // outbound writer
            maybe_out = out_rx.recv() => {
                let Some(frame) = maybe_out else { break Ok(()) };
                let text = match frame.to_json() {
                    Ok(t) => t,
                    Err(e) => break Err(e),
                };
                if ws_tx.send(Message::Text(text)).await.is_err() {
                    break Ok(());
                }
            }

            // inbound reader
            incoming = ws_rx.next() => {
                let Some(Ok(msg)) = incoming else { break Ok(()) };
                last_activity = Instant::now();

                match msg {
                    Message::Text(s) => {
                        // Settlement is delivered through the sink; the handle is not needed here.
                        let _ = router.handle_envelope(&s);
                    }
                    Message::Binary(b) => {
                        tracing::warn!(len = b.len(), "binary frame ignored");
                    }
                    Message::Ping(payload) => {
                        let _ = ws_tx.send(Message::Pong(payload)).await;
                    }
                    Message::Pong(_) => {}
                    Message::Close(_) => break Ok(()),
                }
            }

            _ = ping_tick.tick() => {
                let _ = ws_tx.send(Message::Ping(Vec::new())).await;
            }

            _ = tokio::time::sleep(Duration::from_millis(250)) => {
                if last_activity.elapsed() >= idle_timeout {
                    tracing::info!(idle_ms = cfg.idle_timeout_ms, "idle timeout");
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break Ok(());
                }
            }
        }
    };

    router.shutdown();
    if router.in_flight() > 0 {
        tracing::debug!(in_flight = router.in_flight(), "detaching with requests still running");
    }
    outcome
}
