//! Bridge config loader (strict parsing).

pub mod schema;

use std::fs;

use bitboard_core::error::{BridgeError, Result};

pub use schema::{
    BridgeConfig, BridgeSection, FixedPosition, HapticsSection, LocationSection, MeshSection,
};

/// Env var naming the config file; falls back to `bitboard.yaml`.
pub const CONFIG_ENV: &str = "BITBOARD_CONFIG";

pub fn load_from_file(path: &str) -> Result<BridgeConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| BridgeError::Config(format!("read {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<BridgeConfig> {
    let cfg: BridgeConfig = serde_yaml::from_str(s)
        .map_err(|e| BridgeError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Path from `BITBOARD_CONFIG`, or the default file name.
pub fn config_path() -> String {
    std::env::var(CONFIG_ENV).unwrap_or_else(|_| "bitboard.yaml".to_string())
}
