//! BitBoard bridge library entry.
//!
//! Wires the capability facades, action services, dispatcher and per-content
//! bridge router together, plus the WebSocket host used by the binary
//! (`main.rs`) and by integration tests.

pub mod app_state;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod facade;
pub mod http;
pub mod obs;
pub mod ops;
pub mod router;
pub mod services;
pub mod sink;
pub mod transport;

pub use client::BridgeClient;
pub use router::BridgeRouter;
pub use sink::{ChannelSink, ContentSink};
