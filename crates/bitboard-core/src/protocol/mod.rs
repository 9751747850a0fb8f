//! Bridge protocol modules.
//!
//! - `envelope`: request/response/callback framing shared by both sides.
//! - `action`: typed dispatch-table entries parsed from request payloads.
//!
//! All parsers are panic-free: malformed input is reported as `BridgeError`
//! so a hostile or buggy content context cannot take the native host down.

pub mod action;
pub mod envelope;

pub use action::{Action, HapticStyle, DEFAULT_GEOHASH_PRECISION};
pub use envelope::{events, Callback, Outbound, Request, Response};
