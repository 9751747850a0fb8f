//! Transport layer (WebSocket).
//!
//! Exposes the WS upgrade handler that attaches one content instance to its
//! own bridge router.

pub mod ws;
