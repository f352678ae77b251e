//! Block data model
//!
//! A block carries its transactions either as a list of ids, as inline raw
//! transaction encodings, or both. Neither list takes part in the block's
//! identity; see [`crate::core::identity::compute_block_id`].

use crate::core::transaction::Transaction;
use crate::crypto::{calculate_merkle_root, MerkleError, ObjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A block as carried on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Id of the parent block, `ObjectId::NULL` for genesis
    pub previous_hash: ObjectId,
    /// Difficulty target (number of leading zero bits required)
    pub difficulty: u32,
    /// Nonce used for proof of work
    pub nonce: u64,
    pub timestamp: DateTime<Utc>,
    /// Merkle root of the block's transactions
    pub transaction_root_hash: ObjectId,
    pub transaction_ids: Option<Vec<ObjectId>>,
    /// Inline raw transaction encodings
    pub transactions: Option<Vec<Vec<u8>>>,
    /// Derived: computed from the stripped header, never transmitted
    #[serde(skip)]
    pub id: ObjectId,
    /// Derived: the exact bytes this block was parsed from
    #[serde(skip)]
    pub original: Vec<u8>,
}

impl Block {
    /// Create an unmined block committing to `transactions`
    pub fn new(
        previous_hash: ObjectId,
        transactions: &[Transaction],
        difficulty: u32,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, MerkleError> {
        let transaction_root_hash = calculate_merkle_root(transactions)?;
        let encoded = transactions
            .iter()
            .map(Transaction::to_bytes)
            .collect::<Result<Vec<_>, _>>()?;
        let ids = encoded.iter().map(|raw| ObjectId::digest(raw)).collect();

        Ok(Self {
            previous_hash,
            difficulty,
            nonce: 0,
            timestamp,
            transaction_root_hash,
            transaction_ids: Some(ids),
            transactions: Some(encoded),
            id: ObjectId::NULL,
            original: Vec::new(),
        })
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_hash.is_null()
    }

    /// Check `transaction_root_hash` against the given transaction list
    pub fn verify_transaction_root(&self, transactions: &[Transaction]) -> bool {
        match calculate_merkle_root(transactions) {
            Ok(root) => root == self.transaction_root_hash,
            Err(_) => false,
        }
    }

    /// Number of transactions listed, by id or inline
    pub fn tx_count(&self) -> usize {
        self.transaction_ids
            .as_ref()
            .map(Vec::len)
            .or_else(|| self.transactions.as_ref().map(Vec::len))
            .unwrap_or(0)
    }

    /// Serialize to the canonical binary encoding
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Decode the structured fields only; derived fields stay empty
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}
