//! Domain values that cross the bridge.
//!
//! Every type here serializes field-by-field into the camelCase JSON shape the
//! content context expects. Optional fields that are absent are omitted, not
//! emitted as `null`.

pub mod location;
pub mod mesh;

use std::time::{SystemTime, UNIX_EPOCH};

pub use location::{Authorization, Position};
pub use mesh::{BluetoothState, MeshMessage, MeshPeer, MeshStatus, MessageDraft, MessageKind};

/// Milliseconds since the Unix epoch (the wire timestamp unit).
pub type Millis = u64;

/// Current wall clock in [`Millis`].
pub fn now_millis() -> Millis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as Millis
}
