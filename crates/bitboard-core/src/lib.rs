//! BitBoard core: bridge wire contracts, error taxonomy, domain model and the
//! geohash codec.
//!
//! This crate defines everything that crosses the web/native boundary and is
//! shared by the bridge host, the content-side client and tests. It carries no
//! async runtime so the same contracts can be reused from any embedding.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed envelopes and payloads surface as `BridgeError`, never as a crash
//! on the native side.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod geohash;
pub mod model;
pub mod protocol;

/// Shared result type.
pub use error::{BridgeError, Result};
