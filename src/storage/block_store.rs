//! Raw block storage keyed by block id
//!
//! Append-only: an id is inserted at most once and never removed.

use crate::crypto::ObjectId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Concurrent map of block id to the raw bytes the block arrived as
#[derive(Debug, Default)]
pub struct BlockStore {
    blocks: DashMap<ObjectId, Vec<u8>>,
}

impl BlockStore {
    pub fn new() -> Self {
        Self {
            blocks: DashMap::new(),
        }
    }

    /// Insert `data` under `id` unless the id is already present
    ///
    /// The presence check and the insert happen under the same shard lock,
    /// so of any number of concurrent callers for one id exactly one sees
    /// `true`.
    pub fn insert_if_absent(&self, id: ObjectId, data: Vec<u8>) -> bool {
        match self.blocks.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(data);
                true
            }
        }
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.blocks.contains_key(id)
    }

    pub fn get(&self, id: &ObjectId) -> Option<Vec<u8>> {
        self.blocks.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
