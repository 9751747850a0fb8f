//! Shared error type across BitBoard crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientCode {
    /// Missing or mistyped payload field.
    InvalidPayload,
    /// Action not in the dispatch table.
    UnknownAction,
    /// Platform permission refused.
    PermissionDenied,
    /// Direct send target is not a known peer.
    PeerNotFound,
    /// Provider could not produce a location fix.
    LocationUnavailable,
    /// Underlying provider/transport failure.
    TransportError,
    /// Provider call did not settle in time.
    Timeout,
    /// Envelope without a usable id/action.
    MalformedEnvelope,
    /// Invalid configuration.
    Config,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ClientCode {
    /// String representation used in logs and metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::InvalidPayload => "INVALID_PAYLOAD",
            ClientCode::UnknownAction => "UNKNOWN_ACTION",
            ClientCode::PermissionDenied => "PERMISSION_DENIED",
            ClientCode::PeerNotFound => "PEER_NOT_FOUND",
            ClientCode::LocationUnavailable => "LOCATION_UNAVAILABLE",
            ClientCode::TransportError => "TRANSPORT_ERROR",
            ClientCode::Timeout => "TIMEOUT",
            ClientCode::MalformedEnvelope => "MALFORMED_ENVELOPE",
            ClientCode::Config => "CONFIG",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Unified error type used by core and bridge.
///
/// `Clone` so a single provider failure can settle every caller waiting on it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BridgeError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Peer not found: {0}")]
    PeerNotFound(String),
    #[error("Location unavailable")]
    LocationUnavailable,
    #[error("{0}")]
    Transport(String),
    #[error("Timed out after {0} ms")]
    Timeout(u64),
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("config: {0}")]
    Config(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Payload key missing or of the wrong type.
    pub fn missing(key: &str) -> Self {
        BridgeError::InvalidPayload(format!("missing {key}"))
    }

    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            BridgeError::InvalidPayload(_) => ClientCode::InvalidPayload,
            BridgeError::UnknownAction(_) => ClientCode::UnknownAction,
            BridgeError::PermissionDenied => ClientCode::PermissionDenied,
            BridgeError::PeerNotFound(_) => ClientCode::PeerNotFound,
            BridgeError::LocationUnavailable => ClientCode::LocationUnavailable,
            BridgeError::Transport(_) => ClientCode::TransportError,
            BridgeError::Timeout(_) => ClientCode::Timeout,
            BridgeError::MalformedEnvelope(_) => ClientCode::MalformedEnvelope,
            BridgeError::Config(_) => ClientCode::Config,
            BridgeError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            BridgeError::Internal(_) => ClientCode::Internal,
        }
    }
}
