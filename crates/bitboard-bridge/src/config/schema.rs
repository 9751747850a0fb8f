use serde::Deserialize;
use bitboard_core::error::{BridgeError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    pub version: u32,

    #[serde(default)]
    pub bridge: BridgeSection,

    #[serde(default)]
    pub location: LocationSection,

    #[serde(default)]
    pub mesh: MeshSection,

    #[serde(default)]
    pub haptics: HapticsSection,
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(BridgeError::UnsupportedVersion);
        }

        self.bridge.validate()?;
        self.location.validate()?;
        self.mesh.validate()?;

        Ok(())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            version: 1,
            bridge: BridgeSection::default(),
            location: LocationSection::default(),
            mesh: MeshSection::default(),
            haptics: HapticsSection::default(),
        }
    }
}

fn invalid(msg: &str) -> BridgeError {
    BridgeError::Config(msg.to_string())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Upper bound on one request's lifetime; 0 disables.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Outbound frames buffered per content instance.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,

    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            request_timeout_ms: default_request_timeout_ms(),
            outbound_queue: default_outbound_queue(),
            ping_interval_ms: default_ping_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

impl BridgeSection {
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms != 0 && !(100..=600_000).contains(&self.request_timeout_ms) {
            return Err(invalid(
                "bridge.request_timeout_ms must be 0 or between 100 and 600000",
            ));
        }
        if !(1..=65_536).contains(&self.outbound_queue) {
            return Err(invalid("bridge.outbound_queue must be between 1 and 65536"));
        }
        if !(1_000..=120_000).contains(&self.ping_interval_ms) {
            return Err(invalid(
                "bridge.ping_interval_ms must be between 1000 and 120000",
            ));
        }
        if self.idle_timeout_ms > 600_000 {
            return Err(invalid("bridge.idle_timeout_ms must be at most 600000"));
        }
        if self.idle_timeout_ms <= self.ping_interval_ms {
            return Err(invalid(
                "bridge.idle_timeout_ms must be greater than ping_interval_ms",
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "127.0.0.1:8787".into()
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_outbound_queue() -> usize {
    256
}
fn default_ping_interval_ms() -> u64 {
    20_000
}
fn default_idle_timeout_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationSection {
    /// Wait after asking the platform for permission before re-checking.
    #[serde(default = "default_permission_grace_ms")]
    pub permission_grace_ms: u64,

    /// Permission request cycles before giving up.
    #[serde(default = "default_permission_retries")]
    pub permission_retries: u32,

    /// Upper bound on one provider fix; 0 disables.
    #[serde(default = "default_fix_timeout_ms")]
    pub fix_timeout_ms: u64,

    #[serde(default = "default_precision")]
    pub default_precision: usize,

    /// Static fix served by the development provider.
    #[serde(default)]
    pub fixed: Option<FixedPosition>,
}

impl Default for LocationSection {
    fn default() -> Self {
        Self {
            permission_grace_ms: default_permission_grace_ms(),
            permission_retries: default_permission_retries(),
            fix_timeout_ms: default_fix_timeout_ms(),
            default_precision: default_precision(),
            fixed: None,
        }
    }
}

impl LocationSection {
    pub fn validate(&self) -> Result<()> {
        if self.permission_grace_ms > 10_000 {
            return Err(invalid("location.permission_grace_ms must be at most 10000"));
        }
        if self.permission_retries > 5 {
            return Err(invalid("location.permission_retries must be at most 5"));
        }
        if self.fix_timeout_ms != 0 && !(100..=120_000).contains(&self.fix_timeout_ms) {
            return Err(invalid(
                "location.fix_timeout_ms must be 0 or between 100 and 120000",
            ));
        }
        if !(1..=12).contains(&self.default_precision) {
            return Err(invalid("location.default_precision must be between 1 and 12"));
        }
        if let Some(f) = &self.fixed {
            f.validate()?;
        }
        Ok(())
    }
}

fn default_permission_grace_ms() -> u64 {
    500
}
fn default_permission_retries() -> u32 {
    1
}
fn default_fix_timeout_ms() -> u64 {
    15_000
}
fn default_precision() -> usize {
    6
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixedPosition {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_accuracy")]
    pub accuracy: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
}

impl FixedPosition {
    fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(invalid("location.fixed.latitude must be between -90 and 90"));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(invalid("location.fixed.longitude must be between -180 and 180"));
        }
        if self.accuracy.is_nan() || self.accuracy < 0.0 {
            return Err(invalid("location.fixed.accuracy must be non-negative"));
        }
        Ok(())
    }
}

fn default_accuracy() -> f64 {
    10.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeshSection {
    /// Re-emit accepted broadcasts as incoming `mesh.message` (dev hosts).
    #[serde(default)]
    pub echo_broadcasts: bool,

    #[serde(default = "default_peer_expiry_ms")]
    pub peer_expiry_ms: u64,

    /// Per-stream event buffer; slower subscribers skip ahead.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for MeshSection {
    fn default() -> Self {
        Self {
            echo_broadcasts: false,
            peer_expiry_ms: default_peer_expiry_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl MeshSection {
    pub fn validate(&self) -> Result<()> {
        if !(1_000..=3_600_000).contains(&self.peer_expiry_ms) {
            return Err(invalid("mesh.peer_expiry_ms must be between 1000 and 3600000"));
        }
        if !(1..=4_096).contains(&self.event_buffer) {
            return Err(invalid("mesh.event_buffer must be between 1 and 4096"));
        }
        Ok(())
    }
}

fn default_peer_expiry_ms() -> u64 {
    180_000
}
fn default_event_buffer() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HapticsSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for HapticsSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}
