//! Transaction data model
//!
//! A transaction spends outputs of earlier transactions (its input entries)
//! and creates new outputs. A transaction without input entries is a
//! coinbase and is only valid inside a mined block.

use crate::crypto::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to a previous output plus the proof of ownership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InEntry {
    /// Id of the transaction whose output is spent
    pub transaction_id: ObjectId,
    /// Index of the output in that transaction
    pub output_index: u32,
    /// Encoded public key of the spender
    pub public_key: Option<Vec<u8>>,
    /// Signature over the transaction sign hash
    pub signature: Option<Vec<u8>>,
}

impl InEntry {
    /// An unsigned input
    pub fn new(transaction_id: ObjectId, output_index: u32) -> Self {
        Self {
            transaction_id,
            output_index,
            public_key: None,
            signature: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutEntry {
    /// Recipient address (double hash of the recipient's public key)
    pub recipient: ObjectId,
    pub amount: u64,
}

/// A transaction as carried on the wire
///
/// `id` and `original` are filled in when the transaction is parsed from raw
/// bytes and are never part of its encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub timestamp: DateTime<Utc>,
    pub in_entries: Vec<InEntry>,
    pub out_entries: Vec<OutEntry>,
    #[serde(skip)]
    pub id: ObjectId,
    #[serde(skip)]
    pub original: Vec<u8>,
}

impl Transaction {
    pub fn new(
        timestamp: DateTime<Utc>,
        in_entries: Vec<InEntry>,
        out_entries: Vec<OutEntry>,
    ) -> Self {
        Self {
            timestamp,
            in_entries,
            out_entries,
            id: ObjectId::NULL,
            original: Vec::new(),
        }
    }

    /// Mining reward paying `amount` to `recipient`
    pub fn coinbase(recipient: ObjectId, amount: u64, timestamp: DateTime<Utc>) -> Self {
        Self::new(timestamp, Vec::new(), vec![OutEntry { recipient, amount }])
    }

    pub fn is_coinbase(&self) -> bool {
        self.in_entries.is_empty()
    }

    pub fn total_output(&self) -> u64 {
        self.out_entries.iter().map(|out| out.amount).sum()
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
