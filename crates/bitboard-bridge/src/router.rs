//! Bridge router: the native end of one content instance.
//!
//! - decodes request envelopes, correlates them by id
//! - runs every request in its own task (no ordering across requests)
//! - answers each accepted request exactly once through the [`ContentSink`]
//! - pumps mesh events out as callback envelopes, one task per stream

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use bitboard_core::error::{BridgeError, Result};
use bitboard_core::protocol::{events, Action, Callback, Outbound, Request, Response};

use crate::config::BridgeSection;
use crate::dispatch::Dispatcher;
use crate::facade::MeshFacade;
use crate::obs::BridgeMetrics;
use crate::sink::ContentSink;

#[derive(Debug)]
struct InFlight {
    action: String,
    started: Instant,
}

#[derive(Clone)]
pub struct BridgeRouter {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    dispatcher: Arc<Dispatcher>,
    sink: Arc<dyn ContentSink>,
    metrics: Arc<BridgeMetrics>,
    in_flight: DashMap<String, InFlight>,
    pumps: Mutex<Vec<JoinHandle<()>>>,
    request_timeout: Option<Duration>,
}

impl Drop for RouterInner {
    fn drop(&mut self) {
        for p in self.pumps.get_mut().unwrap_or_else(|e| e.into_inner()).drain(..) {
            p.abort();
        }
    }
}

impl BridgeRouter {
    /// Build the router and subscribe to the mesh event streams.
    /// Must be called inside a tokio runtime.
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        mesh: Arc<dyn MeshFacade>,
        sink: Arc<dyn ContentSink>,
        metrics: Arc<BridgeMetrics>,
        cfg: &BridgeSection,
    ) -> Self {
        let router = Self {
            inner: Arc::new(RouterInner {
                dispatcher,
                sink,
                metrics,
                in_flight: DashMap::new(),
                pumps: Mutex::new(Vec::new()),
                request_timeout: (cfg.request_timeout_ms > 0)
                    .then(|| Duration::from_millis(cfg.request_timeout_ms)),
            }),
        };
        router.subscribe_events(mesh.as_ref());
        router
    }

    /// Entry point for one raw text envelope.
    ///
    /// Returns the request task, or `None` when the envelope was dropped
    /// (malformed, or its id is already in flight).
    pub fn handle_envelope(&self, raw: &str) -> Option<JoinHandle<()>> {
        match Request::parse(raw) {
            Ok(req) => self.handle_request(req),
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed envelope");
                self.inner
                    .metrics
                    .dropped_envelopes
                    .inc(&[("reason", "malformed")]);
                None
            }
        }
    }

    /// Same as [`handle_envelope`](Self::handle_envelope) for an already decoded request.
    pub fn handle_request(&self, req: Request) -> Option<JoinHandle<()>> {
        let inner = &self.inner;
        match inner.in_flight.entry(req.id.clone()) {
            Entry::Occupied(e) => {
                tracing::warn!(
                    id = %req.id,
                    action = %req.action,
                    pending = %e.get().action,
                    "dropping request with an id already in flight"
                );
                inner
                    .metrics
                    .dropped_envelopes
                    .inc(&[("reason", "duplicate_id")]);
                return None;
            }
            Entry::Vacant(v) => {
                v.insert(InFlight {
                    action: req.action.clone(),
                    started: Instant::now(),
                });
            }
        }
        inner.metrics.in_flight.inc(&[]);

        let inner = Arc::clone(inner);
        Some(tokio::spawn(async move {
            let Request { id, action, payload } = req;

            let mut work = tokio::spawn(run_action(Arc::clone(&inner), action, payload));
            let result = match inner.request_timeout {
                Some(limit) => match timeout(limit, &mut work).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        work.abort();
                        Ok(Err(BridgeError::Timeout(limit.as_millis() as u64)))
                    }
                },
                None => work.await,
            }
            .unwrap_or_else(|e| Err(BridgeError::Internal(format!("request task failed: {e}"))));

            inner.settle(id, result).await;
        }))
    }

    /// Abort the event pumps. Requests already in flight still complete.
    pub fn shutdown(&self) {
        let mut pumps = self.inner.pumps.lock().unwrap_or_else(|e| e.into_inner());
        for p in pumps.drain(..) {
            p.abort();
        }
        tracing::debug!("bridge router event pumps stopped");
    }

    /// Number of requests awaiting their response.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    fn subscribe_events(&self, mesh: &dyn MeshFacade) {
        let pumps = [
            self.pump(events::MESH_MESSAGE, mesh.subscribe_messages()),
            self.pump(events::MESH_PEER_CHANGE, mesh.subscribe_peers()),
            self.pump(events::MESH_STATUS_CHANGE, mesh.subscribe_status()),
        ];
        self.inner
            .pumps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(pumps);
    }

    /// Forward one event stream in emission order. The pump holds only the
    /// sink and metrics, so dropping the last router clone stops it.
    fn pump<T>(&self, name: &'static str, mut rx: broadcast::Receiver<T>) -> JoinHandle<()>
    where
        T: Serialize + Clone + Send + 'static,
    {
        let sink = Arc::clone(&self.inner.sink);
        let metrics = Arc::clone(&self.inner.metrics);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let cb = match Callback::single(name, &event) {
                            Ok(cb) => cb,
                            Err(e) => {
                                tracing::warn!(event = name, error = %e, "dropping unencodable event");
                                continue;
                            }
                        };
                        metrics.callbacks.inc(&[("name", name)]);
                        if sink.deliver(Outbound::Callback(cb)).await.is_err() {
                            metrics.undelivered.inc(&[("kind", "callback")]);
                            tracing::debug!(event = name, "content sink closed, pump exiting");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(event = name, skipped, "event pump lagged");
                        metrics.lagged_events.add(&[("stream", name)], skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

async fn run_action(inner: Arc<RouterInner>, action: String, payload: Map<String, Value>) -> Result<Value> {
    let action = Action::parse(&action, &payload)?;
    let name = action.name();
    inner.metrics.requests.inc(&[("action", name)]);

    let started = Instant::now();
    let result = inner.dispatcher.dispatch(action).await;
    inner
        .metrics
        .dispatch_duration
        .observe(&[("action", name)], started.elapsed());
    result
}

impl RouterInner {
    async fn settle(&self, id: String, result: Result<Value>) {
        let elapsed = self
            .in_flight
            .remove(&id)
            .map(|(_, f)| f.started.elapsed())
            .unwrap_or_default();
        self.metrics.in_flight.dec(&[]);

        match &result {
            Ok(_) => {
                self.metrics
                    .responses
                    .inc(&[("outcome", "ok"), ("code", "")]);
                tracing::debug!(id = %id, elapsed_ms = elapsed.as_millis() as u64, "request settled");
            }
            Err(e) => {
                let code = e.client_code().as_str();
                self.metrics
                    .responses
                    .inc(&[("outcome", "error"), ("code", code)]);
                tracing::debug!(id = %id, code, error = %e, "request failed");
            }
        }

        if self
            .sink
            .deliver(Outbound::Response(Response::from_result(id, result)))
            .await
            .is_err()
        {
            self.metrics.undelivered.inc(&[("kind", "response")]);
            tracing::debug!("content sink closed, response dropped");
        }
    }
}
