//! P2P Node implementation
//!
//! Wires the transport to the inventory manager: each inbound inventory
//! message is handled on its own task, and admitted blocks flow through a
//! channel executor into a fork tracker.

use crate::core::executor::{ChannelExecutor, ForkTracker, TipUpdate};
use crate::core::Block;
use crate::crypto::ObjectId;
use crate::network::inventory::{InventoryConfig, InventoryError, InventoryManager};
use crate::network::message::{Handshake, InventoryMessage, Message};
use crate::network::peer::{PeerError, PeerManager};
use crate::network::server::{connect_to_peer, handle_connection, Server};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Semaphore};

/// P2P Node configuration
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Port to listen on
    pub port: u16,
    /// Initial peers to connect to
    pub bootstrap_peers: Vec<String>,
    /// Inventory messages handled at once
    pub max_inflight: usize,
    pub inventory: InventoryConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            port: 8333,
            bootstrap_peers: Vec::new(),
            max_inflight: 256,
            inventory: InventoryConfig::default(),
        }
    }
}

/// The main P2P node
pub struct Node {
    pub config: NodeConfig,
    pub peer_manager: Arc<PeerManager>,
    pub inventory: Arc<InventoryManager>,
    pub tracker: Arc<Mutex<ForkTracker>>,
    inflight: Arc<Semaphore>,
    executed_rx: Option<mpsc::UnboundedReceiver<Block>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Message channel sender - set after start() is called
    message_tx: Option<mpsc::Sender<(SocketAddr, Message)>>,
}

impl Node {
    pub fn new(config: NodeConfig) -> Self {
        let peer_manager = Arc::new(PeerManager::new());
        let (executor, executed_rx) = ChannelExecutor::new();
        let inventory = Arc::new(InventoryManager::with_config(
            config.inventory.clone(),
            peer_manager.clone(),
            Arc::new(executor),
        ));

        let inflight = Arc::new(Semaphore::new(config.max_inflight.max(1)));

        Self {
            config,
            peer_manager,
            inventory,
            tracker: Arc::new(Mutex::new(ForkTracker::new())),
            inflight,
            executed_rx: Some(executed_rx),
            shutdown_tx: None,
            message_tx: None,
        }
    }

    /// Start the node and run until shutdown
    pub async fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        let server = Server::bind(self.config.port).await?;
        log::info!("Node started on port {}", self.config.port);

        let (message_tx, mut message_rx) = mpsc::channel::<(SocketAddr, Message)>(1000);
        self.message_tx = Some(message_tx.clone());

        if let Some(executed_rx) = self.executed_rx.take() {
            tokio::spawn(run_executor(executed_rx, self.tracker.clone()));
        }

        let accept_peer_manager = self.peer_manager.clone();
        let port = self.config.port;
        tokio::spawn(async move {
            loop {
                match server.accept().await {
                    Ok((stream, addr)) => {
                        log::info!("Incoming connection from {}", addr);

                        let pm = accept_peer_manager.clone();
                        let tx = message_tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(
                                stream,
                                addr,
                                pm,
                                Handshake::new(port),
                                tx,
                                false,
                            )
                            .await
                            {
                                log::warn!("Connection error with {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        log::error!("Accept error: {}", e);
                    }
                }
            }
        });

        for peer_addr in &self.config.bootstrap_peers {
            if let Err(e) = self.connect_to(peer_addr).await {
                log::warn!("Failed to connect to {}: {}", peer_addr, e);
            }
        }

        loop {
            tokio::select! {
                Some((from, msg)) = message_rx.recv() => {
                    self.handle_message(from, msg).await;
                }
                _ = shutdown_rx.recv() => {
                    log::info!("Node shutting down...");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Connect to a peer
    pub async fn connect_to(&self, addr: &str) -> Result<(), PeerError> {
        log::info!("Connecting to peer: {}", addr);

        let Some(message_tx) = self.message_tx.clone() else {
            return Err(PeerError::ConnectionFailed(
                "node is not started".to_string(),
            ));
        };

        let (stream, peer_addr) = connect_to_peer(addr).await?;
        let pm = self.peer_manager.clone();
        let handshake = Handshake::new(self.config.port);
        tokio::spawn(async move {
            if let Err(e) =
                handle_connection(stream, peer_addr, pm, handshake, message_tx, true).await
            {
                log::warn!("Connection error with {}: {}", peer_addr, e);
            }
        });

        Ok(())
    }

    async fn handle_message(&self, from: SocketAddr, msg: Message) {
        log::debug!("Received {} from {}", msg.type_name(), from);

        match msg {
            Message::Handshake(handshake) => {
                self.peer_manager.update_peer(&from, &handshake).await;
            }

            Message::Inventory(inv) => {
                // Waiting here stalls the message channel, and with it the readers
                let Ok(permit) = self.inflight.clone().acquire_owned().await else {
                    return;
                };
                let inventory = self.inventory.clone();
                tokio::spawn(async move {
                    let kind = inv.kind;
                    if let Err(e) = inventory.handle_message(inv, from).await {
                        log::warn!("Rejected {:?} from {}: {}", kind, from, e);
                    }
                    drop(permit);
                });
            }
        }
    }

    /// Admit a locally produced block and advertise it to every peer
    pub async fn announce_block(
        &self,
        id: ObjectId,
        data: Vec<u8>,
    ) -> Result<Option<Block>, InventoryError> {
        let block = self.inventory.try_load_block(id, data)?;
        if block.is_some() {
            self.peer_manager
                .broadcast(Message::Inventory(InventoryMessage::advertise(id, true)))
                .await;
        }
        Ok(block)
    }

    /// Admit a locally created transaction and advertise it to every peer
    pub async fn announce_transaction(&self, data: Vec<u8>) -> Result<bool, InventoryError> {
        let Some(tx) = self.inventory.try_add_transaction(data)? else {
            return Ok(false);
        };
        self.peer_manager
            .broadcast(Message::Inventory(InventoryMessage::advertise(tx.id, false)))
            .await;
        Ok(true)
    }

    /// Get node status
    pub async fn status(&self) -> NodeStatus {
        let tip = self.tracker.lock().await.tip().map(|b| b.id);

        NodeStatus {
            port: self.config.port,
            peers: self.peer_manager.peer_count().await,
            blocks: self.inventory.blocks().len(),
            pending_tx: self.inventory.mempool().len(),
            tip,
        }
    }

    /// Shutdown the node
    pub async fn shutdown(&self) {
        if let Some(tx) = &self.shutdown_tx {
            let _ = tx.send(()).await;
        }
    }
}

/// Drain executed blocks into the fork tracker
async fn run_executor(mut rx: mpsc::UnboundedReceiver<Block>, tracker: Arc<Mutex<ForkTracker>>) {
    while let Some(block) = rx.recv().await {
        let update = tracker.lock().await.apply(block);
        match update {
            TipUpdate::Extended { tip, height } => {
                log::info!("Tip is now {} at height {}", tip, height);
            }
            TipUpdate::Reorganized {
                fork_point,
                old_tip,
                new_tip,
            } => {
                log::info!(
                    "Switched tip from {} to {} (fork point {})",
                    old_tip,
                    new_tip,
                    fork_point
                );
            }
            TipUpdate::SideBranch { fork_point, block } => {
                log::info!("Block {} is on a side branch forking at {}", block, fork_point);
            }
            TipUpdate::Detached { block } => {
                log::debug!("Block {} has no recorded common history yet", block);
            }
        }
    }
}

/// Node status information
#[derive(Debug, Clone)]
pub struct NodeStatus {
    pub port: u16,
    pub peers: usize,
    pub blocks: usize,
    pub pending_tx: usize,
    pub tip: Option<ObjectId>,
}
