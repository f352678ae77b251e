//! Peer management for P2P networking
//!
//! Tracks connected peers and routes outbound messages to them. The
//! inventory manager only sees the [`PeerSender`] side of this.

use crate::network::message::{Handshake, InventoryMessage, Message};
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};

/// Peers are identified by their socket address
pub type PeerId = SocketAddr;

/// Maximum number of connected peers
pub const MAX_PEERS: usize = 8;

/// Peer connection errors
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Peer disconnected")]
    Disconnected,
    #[error("Max peers reached")]
    MaxPeersReached,
    #[error("Outbound queue full")]
    QueueFull,
}

/// Outbound side of the transport, as used by the inventory manager
///
/// Delivery is fire-and-forget: an `Ok` means the message was queued for
/// the peer, not that the peer received it.
#[async_trait]
pub trait PeerSender: Send + Sync {
    /// Send one inventory message to a single peer
    async fn send(&self, message: InventoryMessage, peer: PeerId) -> Result<(), PeerError>;

    /// Send one inventory message to every connected peer except `except`
    async fn broadcast(&self, message: InventoryMessage, except: PeerId);
}

/// Information about a connected peer
#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub addr: SocketAddr,
    /// Set once the peer's handshake arrives
    pub user_agent: Option<String>,
    pub listen_port: Option<u16>,
    /// Whether this is an outbound connection
    pub outbound: bool,
}

/// Handle for sending messages to a peer
#[derive(Clone)]
pub struct PeerHandle {
    pub addr: SocketAddr,
    pub tx: mpsc::Sender<Message>,
}

impl PeerHandle {
    /// Queue a message without waiting; a peer that stops reading loses
    /// messages instead of stalling the sender
    pub fn send(&self, msg: Message) -> Result<(), PeerError> {
        self.tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PeerError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => PeerError::Disconnected,
        })
    }
}

/// Manages all peer connections
#[derive(Default)]
pub struct PeerManager {
    peers: RwLock<HashMap<SocketAddr, PeerInfo>>,
    handles: RwLock<HashMap<SocketAddr, PeerHandle>>,
}

impl PeerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new peer
    pub async fn add_peer(
        &self,
        addr: SocketAddr,
        handle: PeerHandle,
        outbound: bool,
    ) -> Result<(), PeerError> {
        let mut peers = self.peers.write().await;

        if peers.len() >= MAX_PEERS {
            return Err(PeerError::MaxPeersReached);
        }

        peers.insert(
            addr,
            PeerInfo {
                addr,
                user_agent: None,
                listen_port: None,
                outbound,
            },
        );
        self.handles.write().await.insert(addr, handle);

        log::info!("Added peer: {} (outbound: {})", addr, outbound);
        Ok(())
    }

    /// Remove a peer
    pub async fn remove_peer(&self, addr: &SocketAddr) {
        self.peers.write().await.remove(addr);
        self.handles.write().await.remove(addr);
        log::info!("Removed peer: {}", addr);
    }

    /// Update peer info after handshake
    pub async fn update_peer(&self, addr: &SocketAddr, handshake: &Handshake) {
        let mut peers = self.peers.write().await;
        if let Some(peer) = peers.get_mut(addr) {
            peer.user_agent = Some(handshake.user_agent.clone());
            peer.listen_port = Some(handshake.listen_port);
            log::info!("Peer {} connected: agent={}", addr, handshake.user_agent);
        }
    }

    pub async fn get_peer_info(&self, addr: &SocketAddr) -> Option<PeerInfo> {
        self.peers.read().await.get(addr).cloned()
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Broadcast a message to all peers
    pub async fn broadcast(&self, msg: Message) {
        for handle in self.snapshot().await {
            if let Err(e) = handle.send(msg.clone()) {
                log::warn!("Failed to send to {}: {}", handle.addr, e);
            }
        }
    }

    /// Broadcast a message to all peers except one
    pub async fn broadcast_except(&self, msg: Message, except: &SocketAddr) {
        for handle in self.snapshot().await {
            if handle.addr == *except {
                continue;
            }
            if let Err(e) = handle.send(msg.clone()) {
                log::warn!("Failed to send to {}: {}", handle.addr, e);
            }
        }
    }

    /// Send a message to a specific peer
    pub async fn send_to(&self, addr: &SocketAddr, msg: Message) -> Result<(), PeerError> {
        let handle = self.handles.read().await.get(addr).cloned();
        match handle {
            Some(handle) => handle.send(msg),
            None => Err(PeerError::Disconnected),
        }
    }

    /// Copy of the current handles, taken so no lock is held while sending
    async fn snapshot(&self) -> Vec<PeerHandle> {
        self.handles.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl PeerSender for PeerManager {
    async fn send(&self, message: InventoryMessage, peer: PeerId) -> Result<(), PeerError> {
        self.send_to(&peer, Message::Inventory(message)).await
    }

    async fn broadcast(&self, message: InventoryMessage, except: PeerId) {
        self.broadcast_except(Message::Inventory(message), &except)
            .await;
    }
}
