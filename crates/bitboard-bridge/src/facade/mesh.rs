//! Mesh facade.
//!
//! The radio transport is a trait; this module owns everything above it:
//! the peer table, the derived `MeshStatus`, and the three event streams.
//! State only changes through [`Mesh::apply`] (transport callbacks) and the
//! facade's own peer expiry policy.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use bitboard_core::error::{BridgeError, Result};
use bitboard_core::model::{now_millis, BluetoothState, Millis, MeshMessage, MeshPeer, MeshStatus};

use crate::config::MeshSection;

/// A subscription to one event category. Dropping it unsubscribes.
pub type EventStream<T> = broadcast::Receiver<T>;

/// Sender shown on broadcasts echoed back by the facade itself.
pub const LOCAL_SENDER: &str = "local";

/// What the bridge needs from a mesh implementation.
#[async_trait]
pub trait MeshFacade: Send + Sync {
    /// Last-known status. Never blocks.
    fn status(&self) -> MeshStatus;
    /// Last-known peer list. Never blocks.
    fn peers(&self) -> Vec<MeshPeer>;
    /// Completes once the transport accepted the submission.
    async fn broadcast(&self, message: MeshMessage) -> Result<()>;
    /// Fails with `PeerNotFound` if `peer_id` is not in the peer list.
    async fn send_direct(&self, peer_id: &str, message: MeshMessage) -> Result<()>;

    fn subscribe_messages(&self) -> EventStream<MeshMessage>;
    fn subscribe_peers(&self) -> EventStream<Vec<MeshPeer>>;
    fn subscribe_status(&self) -> EventStream<MeshStatus>;
}

/// Radio-side submission API. Implementations wrap the real radio stack.
#[async_trait]
pub trait MeshTransport: Send + Sync {
    async fn submit_broadcast(&self, message: &MeshMessage) -> Result<()>;
    async fn submit_direct(&self, peer_id: &str, message: &MeshMessage) -> Result<()>;
}

/// Callbacks from the transport into the facade.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    MessageReceived(MeshMessage),
    /// First discovery or rediscovery of a peer.
    PeerSeen(MeshPeer),
    PeerLost(String),
    RadioChanged {
        bluetooth_state: BluetoothState,
        scanning: bool,
        advertising: bool,
    },
}

#[derive(Debug, Clone, Copy, Default)]
struct Radio {
    bluetooth_state: BluetoothState,
    scanning: bool,
    advertising: bool,
}

#[derive(Debug, Default)]
struct Snapshot {
    radio: Radio,
    peers: Vec<MeshPeer>,
}

impl Snapshot {
    fn status(&self) -> MeshStatus {
        MeshStatus::derive(
            self.radio.bluetooth_state,
            self.radio.scanning,
            self.radio.advertising,
            self.peers.len(),
        )
    }
}

/// Mesh facade over a transport `T`.
pub struct Mesh<T> {
    transport: T,
    snapshot: watch::Sender<Snapshot>,
    messages: broadcast::Sender<MeshMessage>,
    peer_events: broadcast::Sender<Vec<MeshPeer>>,
    status_events: broadcast::Sender<MeshStatus>,
    echo_broadcasts: bool,
    peer_expiry_ms: u64,
}

impl<T: MeshTransport> Mesh<T> {
    pub fn new(transport: T, cfg: &MeshSection) -> Self {
        let (snapshot, _) = watch::channel(Snapshot::default());
        let (messages, _) = broadcast::channel(cfg.event_buffer);
        let (peer_events, _) = broadcast::channel(cfg.event_buffer);
        let (status_events, _) = broadcast::channel(cfg.event_buffer);
        Self {
            transport,
            snapshot,
            messages,
            peer_events,
            status_events,
            echo_broadcasts: cfg.echo_broadcasts,
            peer_expiry_ms: cfg.peer_expiry_ms,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Feed one transport callback into the facade.
    pub fn apply(&self, event: TransportEvent) {
        match event {
            TransportEvent::MessageReceived(m) => {
                tracing::debug!(id = %m.id, sender = %m.sender, "mesh message received");
                let _ = self.messages.send(m);
            }
            TransportEvent::PeerSeen(peer) => {
                self.update_peers(|peers| {
                    match peers.iter_mut().find(|p| p.id == peer.id) {
                        Some(existing) => *existing = peer,
                        None => peers.push(peer),
                    }
                    true
                });
            }
            TransportEvent::PeerLost(id) => {
                self.update_peers(|peers| {
                    let before = peers.len();
                    peers.retain(|p| p.id != id);
                    peers.len() != before
                });
            }
            TransportEvent::RadioChanged {
                bluetooth_state,
                scanning,
                advertising,
            } => {
                self.snapshot.send_modify(|s| {
                    s.radio = Radio {
                        bluetooth_state,
                        scanning,
                        advertising,
                    };
                    let _ = self.status_events.send(s.status());
                });
                tracing::info!(state = ?bluetooth_state, "mesh radio changed");
            }
        }
    }

    /// Drop peers not seen within the expiry window. Returns how many left.
    pub fn expire_peers(&self, now: Millis) -> usize {
        let expiry = self.peer_expiry_ms;
        let mut removed = 0;
        self.update_peers(|peers| {
            let before = peers.len();
            peers.retain(|p| now.saturating_sub(p.last_seen) < expiry);
            removed = before - peers.len();
            removed > 0
        });
        if removed > 0 {
            tracing::debug!(removed, "expired stale mesh peers");
        }
        removed
    }

    // `edit` returns whether anything changed; events go out only then.
    // Events are sent while the snapshot is still locked so concurrent
    // writers emit in the order their edits were applied.
    fn update_peers(&self, edit: impl FnOnce(&mut Vec<MeshPeer>) -> bool) {
        self.snapshot.send_if_modified(|s| {
            if !edit(&mut s.peers) {
                return false;
            }
            let _ = self.peer_events.send(s.peers.clone());
            let _ = self.status_events.send(s.status());
            true
        });
    }
}

impl<T: MeshTransport + 'static> Mesh<T> {
    /// Run [`Mesh::expire_peers`] every `every` until the facade is dropped.
    pub fn spawn_expiry_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                let Some(mesh) = weak.upgrade() else { break };
                mesh.expire_peers(now_millis());
            }
        })
    }
}

#[async_trait]
impl<T: MeshTransport> MeshFacade for Mesh<T> {
    fn status(&self) -> MeshStatus {
        self.snapshot.borrow().status()
    }

    fn peers(&self) -> Vec<MeshPeer> {
        self.snapshot.borrow().peers.clone()
    }

    async fn broadcast(&self, message: MeshMessage) -> Result<()> {
        self.transport.submit_broadcast(&message).await?;
        tracing::debug!(id = %message.id, "mesh broadcast accepted");
        if self.echo_broadcasts {
            self.apply(TransportEvent::MessageReceived(message.with_sender(LOCAL_SENDER)));
        }
        Ok(())
    }

    async fn send_direct(&self, peer_id: &str, message: MeshMessage) -> Result<()> {
        let known = self.snapshot.borrow().peers.iter().any(|p| p.id == peer_id);
        if !known {
            return Err(BridgeError::PeerNotFound(peer_id.to_string()));
        }
        self.transport.submit_direct(peer_id, &message).await?;
        tracing::debug!(id = %message.id, peer = %peer_id, "mesh direct message accepted");
        Ok(())
    }

    fn subscribe_messages(&self) -> EventStream<MeshMessage> {
        self.messages.subscribe()
    }

    fn subscribe_peers(&self) -> EventStream<Vec<MeshPeer>> {
        self.peer_events.subscribe()
    }

    fn subscribe_status(&self) -> EventStream<MeshStatus> {
        self.status_events.subscribe()
    }
}

/// One submission recorded by [`LoopbackTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Broadcast(MeshMessage),
    Direct { peer_id: String, message: MeshMessage },
}

/// Transport that accepts everything and records it. Stands in for the radio
/// on development hosts and in tests.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    delay: Option<Duration>,
    failure: Option<String>,
    sent: Mutex<Vec<Submission>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every submission for `delay` before accepting it.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Reject every submission with `msg` as a transport error.
    pub fn failing(msg: impl Into<String>) -> Self {
        Self {
            failure: Some(msg.into()),
            ..Self::default()
        }
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn submit(&self, s: Submission) -> Result<()> {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if let Some(msg) = &self.failure {
            return Err(BridgeError::Transport(msg.clone()));
        }
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).push(s);
        Ok(())
    }
}

#[async_trait]
impl MeshTransport for LoopbackTransport {
    async fn submit_broadcast(&self, message: &MeshMessage) -> Result<()> {
        self.submit(Submission::Broadcast(message.clone())).await
    }

    async fn submit_direct(&self, peer_id: &str, message: &MeshMessage) -> Result<()> {
        self.submit(Submission::Direct {
            peer_id: peer_id.to_string(),
            message: message.clone(),
        })
        .await
    }
}
