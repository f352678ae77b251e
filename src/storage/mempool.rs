//! Memory pool of unconfirmed transactions
//!
//! Holds parsed, non-coinbase transactions keyed by id. Insertion is
//! at-most-once; removal on confirmation belongs to the block executor.

use crate::core::transaction::Transaction;
use crate::crypto::ObjectId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct MemoryPool {
    entries: DashMap<ObjectId, Transaction>,
}

impl MemoryPool {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Insert `tx` under its id unless already present; `true` if inserted
    pub fn insert_if_absent(&self, tx: Transaction) -> bool {
        match self.entries.entry(tx.id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(tx);
                true
            }
        }
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &ObjectId) -> Option<Transaction> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    /// Drop a transaction, typically once a block confirms it
    pub fn remove(&self, id: &ObjectId) -> Option<Transaction> {
        self.entries.remove(id).map(|(_, tx)| tx)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
