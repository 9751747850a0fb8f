//! Top-level facade crate for BitBoard.
//!
//! Re-exports the wire contracts and the bridge library so users can depend on a single crate.

pub mod core {
    pub use bitboard_core::*;
}

pub mod bridge {
    pub use bitboard_bridge::*;
}

pub use bitboard_core::geohash;
pub use bitboard_bridge::{BridgeClient, BridgeRouter};
