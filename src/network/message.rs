//! Network message types for P2P communication
//!
//! Objects travel in three steps: a peer advertises an id, the receiver
//! requests it, and the holder answers with the body.

use crate::crypto::ObjectId;
use serde::{Deserialize, Serialize};

/// Protocol version
pub const PROTOCOL_VERSION: u32 = 1;

/// Magic bytes for message framing
pub const MAGIC: [u8; 4] = [0x4D, 0x49, 0x4E, 0x49]; // "MINI"

/// Largest body (block or transaction) accepted, inclusive
pub const MAX_OBJECT_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryType {
    Advertise,
    Request,
    Body,
}

/// One step of the gossip exchange for one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryMessage {
    #[serde(rename = "type")]
    pub kind: InventoryType,
    pub is_block: bool,
    pub object_id: ObjectId,
    /// Only a body carries a payload
    pub data: Option<Vec<u8>>,
}

impl InventoryMessage {
    pub fn advertise(object_id: ObjectId, is_block: bool) -> Self {
        Self {
            kind: InventoryType::Advertise,
            is_block,
            object_id,
            data: None,
        }
    }

    pub fn request(object_id: ObjectId, is_block: bool) -> Self {
        Self {
            kind: InventoryType::Request,
            is_block,
            object_id,
            data: None,
        }
    }

    pub fn body(object_id: ObjectId, is_block: bool, data: Vec<u8>) -> Self {
        Self {
            kind: InventoryType::Body,
            is_block,
            object_id,
            data: Some(data),
        }
    }

    /// Short label for logging
    pub fn object_kind(&self) -> &'static str {
        if self.is_block {
            "block"
        } else {
            "transaction"
        }
    }
}

/// Network message envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    /// Initial handshake when connecting
    Handshake(Handshake),

    /// Inventory gossip
    Inventory(InventoryMessage),
}

/// Handshake message for initial connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handshake {
    /// Protocol version
    pub version: u32,
    /// Node's listening port (for incoming connections)
    pub listen_port: u16,
    /// Node's user agent string
    pub user_agent: String,
}

impl Handshake {
    pub fn new(listen_port: u16) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            listen_port,
            user_agent: format!("mini-chain-relay/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Message {
    /// Serialize message to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize message from bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Get message type name for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Handshake(_) => "Handshake",
            Message::Inventory(inv) => match inv.kind {
                InventoryType::Advertise => "Advertise",
                InventoryType::Request => "Request",
                InventoryType::Body => "Body",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_message_serialization() {
        let id = ObjectId::digest(b"block");
        let msg = Message::Inventory(InventoryMessage::body(id, true, vec![1, 2, 3]));
        let decoded = Message::from_bytes(&msg.to_bytes().unwrap()).unwrap();

        match decoded {
            Message::Inventory(inv) => {
                assert_eq!(inv.kind, InventoryType::Body);
                assert!(inv.is_block);
                assert_eq!(inv.object_id, id);
                assert_eq!(inv.data, Some(vec![1, 2, 3]));
            }
            other => panic!("Wrong message type: {}", other.type_name()),
        }
    }

    #[test]
    fn test_metadata_constructors_carry_no_payload() {
        let id = ObjectId::digest(b"tx");
        assert!(InventoryMessage::advertise(id, false).data.is_none());
        assert!(InventoryMessage::request(id, false).data.is_none());
        assert_eq!(InventoryMessage::request(id, false).object_kind(), "transaction");
    }

    #[test]
    fn test_handshake() {
        let handshake = Handshake::new(8333);
        assert_eq!(handshake.version, PROTOCOL_VERSION);
        assert!(handshake.user_agent.starts_with("mini-chain-relay/"));
    }
}
