use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use bitboard_core::error::{BridgeError, Result};
use bitboard_core::protocol::Action;

use super::to_result;
use crate::dispatch::ActionService;
use crate::facade::Location;

/// `location.*` actions.
pub struct LocationService {
    location: Arc<Location>,
    default_precision: i64,
}

impl LocationService {
    pub fn new(location: Arc<Location>, default_precision: usize) -> Self {
        Self {
            location,
            default_precision: default_precision as i64,
        }
    }
}

#[async_trait]
impl ActionService for LocationService {
    fn namespace(&self) -> &'static str {
        "location"
    }

    async fn handle(&self, action: Action) -> Result<Value> {
        match action {
            Action::LocationGetCurrentPosition => {
                to_result(&self.location.get_current_position().await?)
            }
            Action::LocationGetCurrentGeohash { precision } => {
                let precision = precision.unwrap_or(self.default_precision);
                let hash = self.location.get_current_geohash(precision).await?;
                Ok(Value::String(hash))
            }
            other => Err(BridgeError::UnknownAction(other.name().to_string())),
        }
    }
}
