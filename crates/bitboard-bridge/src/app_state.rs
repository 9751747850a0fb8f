//! Shared application state for the bridge host.
//!
//! Facades, dispatcher and metrics are process-wide; every content instance
//! (WebSocket) gets its own [`BridgeRouter`] over them.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use bitboard_core::error::Result;

use crate::config::BridgeConfig;
use crate::dispatch::Dispatcher;
use crate::facade::{
    FixedProvider, Haptics, Location, LocationProvider, LoopbackTransport, Mesh, MeshFacade,
    MeshTransport, NoopHaptics, TracingHaptics,
};
use crate::obs::BridgeMetrics;
use crate::router::BridgeRouter;
use crate::services::{AppService, LocationService, MeshService};
use crate::sink::ContentSink;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: BridgeConfig,
    dispatcher: Arc<Dispatcher>,
    mesh: Arc<dyn MeshFacade>,
    metrics: Arc<BridgeMetrics>,
    sweeper: JoinHandle<()>,
}

impl Drop for AppStateInner {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

impl AppState {
    /// Development host: configured static fix, loopback mesh, logged haptics.
    pub fn new(cfg: BridgeConfig) -> Result<Self> {
        // Facade construction sizes channels from the config.
        cfg.validate()?;
        let provider = Arc::new(FixedProvider::new(cfg.location.fixed.clone()));
        let mesh = Arc::new(Mesh::new(LoopbackTransport::new(), &cfg.mesh));
        Self::with_parts(cfg, provider, mesh, Arc::new(TracingHaptics))
    }

    /// Build state over platform collaborators. Must run inside a tokio runtime.
    pub fn with_parts<T>(
        cfg: BridgeConfig,
        provider: Arc<dyn LocationProvider>,
        mesh: Arc<Mesh<T>>,
        haptics: Arc<dyn Haptics>,
    ) -> Result<Self>
    where
        T: MeshTransport + 'static,
    {
        cfg.validate()?;

        let location = Location::new(provider, &cfg.location);
        let sweep_every = Duration::from_millis(cfg.mesh.peer_expiry_ms / 4).max(MIN_SWEEP_INTERVAL);
        let sweeper = mesh.spawn_expiry_sweeper(sweep_every);

        let dispatcher = Dispatcher::new();
        dispatcher.register(Arc::new(MeshService::new(mesh.clone())));
        dispatcher.register(Arc::new(LocationService::new(
            Arc::new(location),
            cfg.location.default_precision,
        )));
        let haptics: Arc<dyn Haptics> = if cfg.haptics.enabled {
            haptics
        } else {
            Arc::new(NoopHaptics)
        };
        dispatcher.register(Arc::new(AppService::new(haptics)));
        tracing::info!(namespaces = ?dispatcher.registered_namespaces(), "action services registered");

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                dispatcher: Arc::new(dispatcher),
                mesh,
                metrics: Arc::new(BridgeMetrics::default()),
                sweeper,
            }),
        })
    }

    pub fn cfg(&self) -> &BridgeConfig {
        &self.inner.cfg
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.inner.dispatcher)
    }

    pub fn mesh(&self) -> Arc<dyn MeshFacade> {
        Arc::clone(&self.inner.mesh)
    }

    pub fn metrics(&self) -> Arc<BridgeMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    /// Router for one content instance delivering into `sink`.
    pub fn new_router(&self, sink: Arc<dyn ContentSink>) -> BridgeRouter {
        BridgeRouter::new(
            self.dispatcher(),
            self.mesh(),
            sink,
            self.metrics(),
            &self.inner.cfg.bridge,
        )
    }
}
