use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use bitboard_core::error::{BridgeError, Result};
use bitboard_core::protocol::Action;

/// One action namespace (`mesh`, `location`, `app`).
#[async_trait]
pub trait ActionService: Send + Sync {
    fn namespace(&self) -> &'static str;
    /// Execute a validated action; the value becomes the response `result`.
    async fn handle(&self, action: Action) -> Result<Value>;
}

/// Registry and dispatcher keyed by action namespace.
#[derive(Default)]
pub struct Dispatcher {
    services: DashMap<&'static str, Arc<dyn ActionService>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
        }
    }

    pub fn register(&self, svc: Arc<dyn ActionService>) {
        self.services.insert(svc.namespace(), svc);
    }

    pub fn registered_namespaces(&self) -> Vec<&'static str> {
        self.services.iter().map(|e| *e.key()).collect()
    }

    /// An action whose namespace has no service (e.g. haptics disabled) is
    /// answered as unknown.
    pub async fn dispatch(&self, action: Action) -> Result<Value> {
        let handler = self
            .services
            .get(action.namespace())
            .ok_or_else(|| BridgeError::UnknownAction(action.name().to_string()))?
            .value()
            .clone();
        handler.handle(action).await
    }
}
