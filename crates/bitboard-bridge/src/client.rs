//! Content-side end of the bridge.
//!
//! Mirrors what the embedded content does: allocate an id per call, park a
//! completion handle under it, and settle that handle when the response with
//! the same id arrives. Callback envelopes fan out to subscribers.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use bitboard_core::error::{BridgeError, Result};
use bitboard_core::protocol::{Callback, Outbound, Request, Response};

use crate::config::BridgeSection;
use crate::dispatch::Dispatcher;
use crate::facade::MeshFacade;
use crate::obs::BridgeMetrics;
use crate::router::BridgeRouter;
use crate::sink::ChannelSink;

type Pending = Arc<DashMap<String, oneshot::Sender<Response>>>;

const CALLBACK_BUFFER: usize = 64;

#[derive(Clone)]
pub struct BridgeClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    router: BridgeRouter,
    pending: Pending,
    callbacks: broadcast::Sender<Callback>,
    reader: JoinHandle<()>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl BridgeClient {
    /// Wire a router and a client in-process over a [`ChannelSink`].
    pub fn pair(
        dispatcher: Arc<Dispatcher>,
        mesh: Arc<dyn MeshFacade>,
        metrics: Arc<BridgeMetrics>,
        cfg: &BridgeSection,
    ) -> (BridgeRouter, BridgeClient) {
        let (sink, rx) = ChannelSink::channel(cfg.outbound_queue);
        let router = BridgeRouter::new(dispatcher, mesh, Arc::new(sink), metrics, cfg);
        let client = Self::attach(router.clone(), rx);
        (router, client)
    }

    /// Client over an existing router and the receiver its sink feeds.
    pub fn attach(router: BridgeRouter, rx: mpsc::Receiver<Outbound>) -> Self {
        let pending: Pending = Arc::new(DashMap::new());
        let (callbacks, _) = broadcast::channel(CALLBACK_BUFFER);
        let reader = tokio::spawn(read_frames(rx, Arc::clone(&pending), callbacks.clone()));
        Self {
            inner: Arc::new(ClientInner {
                router,
                pending,
                callbacks,
                reader,
            }),
        }
    }

    /// Send one request and wait for its response.
    ///
    /// `Err` only when the bridge itself is gone; an action failure is a
    /// response with `error` set.
    pub async fn call(&self, action: &str, payload: Value) -> Result<Response> {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(id.clone(), tx);

        let raw = serde_json::to_string(&Request::new(id.clone(), action, payload))
            .map_err(|e| BridgeError::Internal(format!("request encode failed: {e}")))?;
        if self.inner.router.handle_envelope(&raw).is_none() {
            self.inner.pending.remove(&id);
            return Err(BridgeError::Internal(format!("request {id} was not accepted")));
        }

        rx.await
            .map_err(|_| BridgeError::Internal("bridge closed before responding".into()))
    }

    pub fn subscribe_callbacks(&self) -> broadcast::Receiver<Callback> {
        self.inner.callbacks.subscribe()
    }

    /// Calls still waiting for a response.
    pub fn pending(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn router(&self) -> &BridgeRouter {
        &self.inner.router
    }
}

async fn read_frames(
    mut rx: mpsc::Receiver<Outbound>,
    pending: Pending,
    callbacks: broadcast::Sender<Callback>,
) {
    while let Some(frame) = rx.recv().await {
        match frame {
            Outbound::Response(resp) => match pending.remove(&resp.id) {
                Some((_, tx)) => {
                    let _ = tx.send(resp);
                }
                None => tracing::warn!(id = %resp.id, "response for unknown id dropped"),
            },
            Outbound::Callback(cb) => {
                let _ = callbacks.send(cb);
            }
        }
    }
    // Router side is gone; fail whatever is still parked.
    pending.clear();
}
