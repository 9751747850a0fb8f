//! Built-in action services, one per namespace.

pub mod app;
pub mod location;
pub mod mesh;

pub use app::AppService;
pub use location::LocationService;
pub use mesh::MeshService;

use serde::Serialize;
use serde_json::Value;

use bitboard_core::error::{BridgeError, Result};

fn to_result<T: Serialize>(v: &T) -> Result<Value> {
    serde_json::to_value(v).map_err(|e| BridgeError::Internal(format!("result encode failed: {e}")))
}
