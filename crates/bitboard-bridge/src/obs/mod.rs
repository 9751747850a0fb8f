//! Lightweight in-process metrics (dependency-free).
//!
//! Stored as atomics, rendered by the `/metrics` handler in Prometheus text.

pub mod metrics;

pub use metrics::BridgeMetrics;
