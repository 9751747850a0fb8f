//! Typed actions.
//!
//! The untyped `payload` map is validated exactly once, here, into one
//! variant per dispatch table entry. Services never look at raw JSON.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{BridgeError, Result};
use crate::model::MessageDraft;

/// Geohash precision used when the request does not name one.
pub const DEFAULT_GEOHASH_PRECISION: i64 = 6;

/// Impact strength for `app.hapticFeedback`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HapticStyle {
    #[default]
    Light,
    Medium,
    Heavy,
}

impl HapticStyle {
    /// Unrecognised styles fall back to `Light`.
    pub fn parse(s: &str) -> Self {
        match s {
            "heavy" => HapticStyle::Heavy,
            "medium" => HapticStyle::Medium,
            _ => HapticStyle::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HapticStyle::Light => "light",
            HapticStyle::Medium => "medium",
            HapticStyle::Heavy => "heavy",
        }
    }
}

/// One entry of the dispatch table with its validated parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    MeshGetStatus,
    MeshGetPeers,
    MeshBroadcast(MessageDraft),
    MeshSendDirect { peer_id: String, message: MessageDraft },
    LocationGetCurrentPosition,
    /// `None` when the payload has no integer `precision`.
    LocationGetCurrentGeohash { precision: Option<i64> },
    AppHapticFeedback { style: HapticStyle },
}

impl Action {
    /// Validate `payload` for `action`.
    pub fn parse(action: &str, payload: &Map<String, Value>) -> Result<Self> {
        let parsed = match action {
            "mesh.getStatus" => Action::MeshGetStatus,
            "mesh.getPeers" => Action::MeshGetPeers,
            "mesh.broadcast" => Action::MeshBroadcast(draft(payload, "")?),
            "mesh.sendDirect" => {
                let peer_id = required_str(payload, "peerId", "peerId")?;
                let message = payload
                    .get("message")
                    .and_then(Value::as_object)
                    .ok_or_else(|| BridgeError::missing("message.content"))?;
                Action::MeshSendDirect {
                    peer_id,
                    message: draft(message, "message.")?,
                }
            }
            "location.getCurrentPosition" => Action::LocationGetCurrentPosition,
            "location.getCurrentGeohash" => Action::LocationGetCurrentGeohash {
                precision: payload.get("precision").and_then(Value::as_i64),
            },
            "app.hapticFeedback" => Action::AppHapticFeedback {
                style: payload
                    .get("style")
                    .and_then(Value::as_str)
                    .map(HapticStyle::parse)
                    .unwrap_or_default(),
            },
            other => return Err(BridgeError::UnknownAction(other.to_string())),
        };
        tracing::trace!(action = parsed.name(), "payload validated");
        Ok(parsed)
    }

    /// Wire name of the action.
    pub fn name(&self) -> &'static str {
        match self {
            Action::MeshGetStatus => "mesh.getStatus",
            Action::MeshGetPeers => "mesh.getPeers",
            Action::MeshBroadcast(_) => "mesh.broadcast",
            Action::MeshSendDirect { .. } => "mesh.sendDirect",
            Action::LocationGetCurrentPosition => "location.getCurrentPosition",
            Action::LocationGetCurrentGeohash { .. } => "location.getCurrentGeohash",
            Action::AppHapticFeedback { .. } => "app.hapticFeedback",
        }
    }

    /// Service namespace the dispatcher routes on (`mesh`, `location`, `app`).
    pub fn namespace(&self) -> &'static str {
        match self {
            Action::MeshGetStatus
            | Action::MeshGetPeers
            | Action::MeshBroadcast(_)
            | Action::MeshSendDirect { .. } => "mesh",
            Action::LocationGetCurrentPosition | Action::LocationGetCurrentGeohash { .. } => {
                "location"
            }
            Action::AppHapticFeedback { .. } => "app",
        }
    }
}

fn required_str(obj: &Map<String, Value>, key: &str, label: &str) -> Result<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| BridgeError::missing(label))
}

fn optional_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_owned)
}

// All-or-nothing: a tags array with any non-string entry is ignored.
fn optional_tags(obj: &Map<String, Value>) -> Option<Vec<String>> {
    obj.get("tags")?
        .as_array()?
        .iter()
        .map(|t| t.as_str().map(str::to_owned))
        .collect()
}

fn draft(obj: &Map<String, Value>, prefix: &str) -> Result<MessageDraft> {
    Ok(MessageDraft {
        content: required_str(obj, "content", &format!("{prefix}content"))?,
        board_id: optional_str(obj, "boardId"),
        parent_id: optional_str(obj, "parentId"),
        tags: optional_tags(obj),
    })
}
