//! Mini-Chain Relay: block and transaction propagation for a minimal
//! blockchain node
//!
//! This crate provides:
//! - Canonical content-derived ids for blocks and transactions
//! - Transaction signing hashes and address derivation
//! - Merkle roots over a block's transaction list
//! - Ancestor walks and fork-point (lowest common ancestor) detection
//! - An inventory manager gossiping blocks and transactions between peers
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use mini_chain_relay::core::{compute_block_id, ancestors, Block, Transaction};
//! use mini_chain_relay::core::identity::deserialize_block;
//! use mini_chain_relay::crypto::ObjectId;
//! use std::collections::HashMap;
//!
//! let coinbase = Transaction::coinbase(ObjectId::digest(b"miner"), 50, Utc::now());
//! let genesis = Block::new(ObjectId::NULL, &[coinbase], 8, Utc::now()).unwrap();
//! let raw = genesis.to_bytes().unwrap();
//!
//! let id = compute_block_id(&raw).unwrap();
//! let genesis = deserialize_block(&raw).unwrap();
//! assert_eq!(genesis.id, id);
//!
//! let mut blocks = HashMap::new();
//! blocks.insert(id, genesis.clone());
//! assert_eq!(ancestors(&genesis, &blocks).count(), 1);
//! ```

pub mod core;
pub mod crypto;
pub mod network;
pub mod storage;

// Re-export commonly used types
pub use crate::core::{
    ancestors, compute_block_id, compute_transaction_id, get_transaction_sign_hash,
    lowest_common_ancestor, to_address, Block, BlockExecutor, Transaction,
};
pub use crate::crypto::{calculate_merkle_root, KeyPair, ObjectId};
pub use crate::network::{
    InventoryManager, InventoryMessage, InventoryType, Node, NodeConfig, PeerSender,
};
pub use crate::storage::{BlockStore, MemoryPool};
