//! P2P Networking module
//!
//! Provides inventory gossip between peers.
//!
//! # Features
//! - Advertise / request / body exchange for blocks and transactions
//! - Exactly-once admission under concurrent delivery
//! - Gap filling by requesting missing parent blocks
//! - TCP transport with length-prefixed framing

pub mod inventory;
pub mod message;
pub mod node;
pub mod peer;
pub mod server;

pub use inventory::{InventoryConfig, InventoryError, InventoryManager};
pub use message::{
    Handshake, InventoryMessage, InventoryType, Message, MAGIC, MAX_OBJECT_SIZE, PROTOCOL_VERSION,
};
pub use node::{Node, NodeConfig, NodeStatus};
pub use peer::{PeerError, PeerHandle, PeerId, PeerInfo, PeerManager, PeerSender, MAX_PEERS};
pub use server::{connect_to_peer, MessageCodec, Server, MAX_FRAME_SIZE};
