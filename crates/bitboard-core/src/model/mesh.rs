use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{now_millis, Millis};

/// Radio adapter state, mirrored from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BluetoothState {
    #[default]
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

/// Snapshot of the mesh facade. Always derived, never edited directly.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshStatus {
    pub is_enabled: bool,
    pub is_scanning: bool,
    pub is_advertising: bool,
    pub peer_count: usize,
    pub bluetooth_state: BluetoothState,
}

impl MeshStatus {
    /// Recompute from radio flags and the current peer table size.
    pub fn derive(state: BluetoothState, scanning: bool, advertising: bool, peer_count: usize) -> Self {
        let powered = state == BluetoothState::PoweredOn;
        Self {
            is_enabled: powered,
            is_scanning: powered && scanning,
            is_advertising: powered && advertising,
            peer_count,
            bluetooth_state: state,
        }
    }
}

/// A peer seen by the mesh transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshPeer {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i32>,
    pub last_seen: Millis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hop_count: Option<u32>,
}

impl MeshPeer {
    pub fn new(id: impl Into<String>, last_seen: Millis) -> Self {
        Self {
            id: id.into(),
            nickname: None,
            rssi: None,
            last_seen,
            hop_count: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Public,
    Direct,
}

/// Content-supplied part of an outgoing message (board metadata included).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageDraft {
    pub content: String,
    pub board_id: Option<String>,
    pub parent_id: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl MessageDraft {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// A mesh message. Immutable once built; the bridge only serializes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    pub sender: String,
    pub timestamp: Millis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hop_count: Option<u32>,
}

impl MeshMessage {
    /// Locally originated message: fresh id, empty sender, stamped now.
    pub fn outgoing(kind: MessageKind, draft: MessageDraft) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            content: draft.content,
            sender: String::new(),
            timestamp: now_millis(),
            board_id: draft.board_id,
            parent_id: draft.parent_id,
            tags: draft.tags,
            hop_count: None,
        }
    }

    /// Copy of this message attributed to another sender.
    pub fn with_sender(&self, sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            ..self.clone()
        }
    }
}
