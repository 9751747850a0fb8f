//! Dispatcher module exports.
//!
//! Re-exports the dispatcher and the service trait so services and the router
//! can depend on this module directly.

pub mod dispatcher;

pub use dispatcher::{ActionService, Dispatcher};
