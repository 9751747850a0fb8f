use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use bitboard_core::error::{BridgeError, Result};
use bitboard_core::model::{MeshMessage, MessageKind};
use bitboard_core::protocol::Action;

use super::to_result;
use crate::dispatch::ActionService;
use crate::facade::MeshFacade;

/// `mesh.*` actions.
pub struct MeshService {
    mesh: Arc<dyn MeshFacade>,
}

impl MeshService {
    pub fn new(mesh: Arc<dyn MeshFacade>) -> Self {
        Self { mesh }
    }
}

#[async_trait]
impl ActionService for MeshService {
    fn namespace(&self) -> &'static str {
        "mesh"
    }

    async fn handle(&self, action: Action) -> Result<Value> {
        match action {
            Action::MeshGetStatus => to_result(&self.mesh.status()),
            Action::MeshGetPeers => to_result(&self.mesh.peers()),
            Action::MeshBroadcast(draft) => {
                let msg = MeshMessage::outgoing(MessageKind::Public, draft);
                tracing::debug!(msg_id = %msg.id, "mesh broadcast");
                self.mesh.broadcast(msg).await?;
                Ok(Value::Null)
            }
            Action::MeshSendDirect { peer_id, message } => {
                let msg = MeshMessage::outgoing(MessageKind::Direct, message);
                tracing::debug!(msg_id = %msg.id, peer = %peer_id, "mesh direct");
                self.mesh.send_direct(&peer_id, msg).await?;
                Ok(Value::Null)
            }
            other => Err(BridgeError::UnknownAction(other.name().to_string())),
        }
    }
}
