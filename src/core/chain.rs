//! Ancestor walks and fork-point detection over a block map
//!
//! The walker reads the map one entry per step and never holds it across
//! steps. A walk over a concurrently growing map therefore sees whatever
//! is present when each parent is looked up; there is no snapshot.

use crate::core::block::Block;
use crate::core::identity::deserialize_block;
use crate::crypto::ObjectId;
use crate::storage::BlockStore;
use std::collections::{HashMap, HashSet};
use std::iter::FusedIterator;

/// Read access to blocks by id
pub trait BlockLookup {
    fn get_block(&self, id: &ObjectId) -> Option<Block>;
}

impl BlockLookup for HashMap<ObjectId, Block> {
    fn get_block(&self, id: &ObjectId) -> Option<Block> {
        self.get(id).cloned()
    }
}

/// Raw entries are parsed on lookup; unparseable entries count as missing
impl BlockLookup for BlockStore {
    fn get_block(&self, id: &ObjectId) -> Option<Block> {
        let raw = self.get(id)?;
        deserialize_block(&raw).ok()
    }
}

/// Lazy walk from a block towards genesis
pub struct Ancestors<'a, S: BlockLookup + ?Sized> {
    store: &'a S,
    next: Option<Block>,
}

impl<S: BlockLookup + ?Sized> Iterator for Ancestors<'_, S> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        let current = self.next.take()?;
        if !current.previous_hash.is_null() {
            self.next = self.store.get_block(&current.previous_hash);
        }
        Some(current)
    }
}

impl<S: BlockLookup + ?Sized> FusedIterator for Ancestors<'_, S> {}

/// Yield `block`, then its parent, and so on until genesis or the first
/// parent the store does not have
pub fn ancestors<'a, S: BlockLookup + ?Sized>(block: &Block, store: &'a S) -> Ancestors<'a, S> {
    Ancestors {
        store,
        next: Some(block.clone()),
    }
}

/// Find the block where the histories of `b1` and `b2` meet
///
/// Both walks advance one step per round, `b1`'s first. The first block
/// produced that was already seen by either walk is returned. `None` means
/// the recorded histories never meet.
pub fn lowest_common_ancestor<S: BlockLookup + ?Sized>(
    b1: &Block,
    b2: &Block,
    store: &S,
) -> Option<Block> {
    let mut seen = HashSet::new();
    let mut left = ancestors(b1, store);
    let mut right = ancestors(b2, store);

    loop {
        let a = left.next();
        let b = right.next();
        if a.is_none() && b.is_none() {
            return None;
        }

        for block in [a, b].into_iter().flatten() {
            if !seen.insert(block.id) {
                return Some(block);
            }
        }
    }
}
