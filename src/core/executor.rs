//! Block executor boundary
//!
//! The inventory manager hands every newly admitted block to a
//! [`BlockExecutor`]. Consensus and state validation live behind it.
//! [`ChannelExecutor`] defers processing to a consumer task, and
//! [`ForkTracker`] is the minimal consumer the node runs: it records
//! executed blocks and reports where competing branches meet.

use crate::core::block::Block;
use crate::core::chain::lowest_common_ancestor;
use crate::crypto::ObjectId;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Receives structurally valid, integrity-checked blocks
pub trait BlockExecutor: Send + Sync {
    fn process_block(&self, block: Block);
}

/// Forwards blocks into an unbounded channel
#[derive(Clone)]
pub struct ChannelExecutor {
    tx: mpsc::UnboundedSender<Block>,
}

impl ChannelExecutor {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Block>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl BlockExecutor for ChannelExecutor {
    fn process_block(&self, block: Block) {
        let id = block.id;
        if self.tx.send(block).is_err() {
            log::warn!("Executor channel closed, dropping block {}", id);
        }
    }
}

/// What a newly executed block did to the tracked tip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TipUpdate {
    /// The block became the tip (first block, or child of the old tip)
    Extended { tip: ObjectId, height: usize },
    /// The block's branch is longer; the tip moved across a fork
    Reorganized {
        fork_point: ObjectId,
        old_tip: ObjectId,
        new_tip: ObjectId,
    },
    /// The block sits on a branch that is not longer than the tip's
    SideBranch { fork_point: ObjectId, block: ObjectId },
    /// No recorded history in common with the tip (parent still missing)
    Detached { block: ObjectId },
}

/// Tracks executed block headers and the highest branch rooted at genesis
///
/// Heights count from a genesis block (height 1). A block whose parent has
/// no height yet waits until the parent arrives, so a branch delivered
/// child-first is connected in one step once its oldest block is applied.
#[derive(Debug, Default)]
pub struct ForkTracker {
    blocks: HashMap<ObjectId, Block>,
    heights: HashMap<ObjectId, usize>,
    /// Blocks keyed by the parent they are waiting for
    waiting: HashMap<ObjectId, Vec<ObjectId>>,
    tip: Option<ObjectId>,
}

impl ForkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tip(&self) -> Option<&Block> {
        self.tip.as_ref().and_then(|id| self.blocks.get(id))
    }

    /// Recorded headers; raw encodings and inline transactions are dropped
    pub fn blocks(&self) -> &HashMap<ObjectId, Block> {
        &self.blocks
    }

    /// Height of a block connected to genesis
    pub fn height(&self, id: &ObjectId) -> Option<usize> {
        self.heights.get(id).copied()
    }

    pub fn apply(&mut self, block: Block) -> TipUpdate {
        let id = block.id;
        let parent = block.previous_hash;
        let header = Block {
            original: Vec::new(),
            transactions: None,
            ..block
        };
        let recorded = self.blocks.insert(id, header).is_some();

        let parent_height = if parent.is_null() {
            Some(0)
        } else {
            self.height(&parent)
        };
        let Some(parent_height) = parent_height else {
            if !recorded {
                self.waiting.entry(parent).or_default().push(id);
            }
            return TipUpdate::Detached { block: id };
        };

        let (best, height) = self.connect(id, parent_height + 1);

        let Some(tip) = self.tip else {
            self.tip = Some(best);
            return TipUpdate::Extended { tip: best, height };
        };
        let tip_height = self.height(&tip).unwrap_or(0);

        if best == tip
            || (height > tip_height && self.ancestor_at(best, tip_height) == Some(tip))
        {
            self.tip = Some(best);
            return TipUpdate::Extended { tip: best, height };
        }

        let fork_point = match (self.blocks.get(&tip), self.blocks.get(&best)) {
            (Some(old), Some(new)) => lowest_common_ancestor(old, new, &self.blocks).map(|b| b.id),
            _ => None,
        };
        let Some(fork_point) = fork_point else {
            return TipUpdate::Detached { block: id };
        };

        if height > tip_height {
            self.tip = Some(best);
            TipUpdate::Reorganized {
                fork_point,
                old_tip: tip,
                new_tip: best,
            }
        } else {
            TipUpdate::SideBranch {
                fork_point,
                block: id,
            }
        }
    }

    /// Assign heights to `id` and every block waiting on it, returning the
    /// highest block reached
    fn connect(&mut self, id: ObjectId, height: usize) -> (ObjectId, usize) {
        let mut best = (id, height);
        let mut pending = vec![(id, height)];

        while let Some((id, height)) = pending.pop() {
            self.heights.insert(id, height);
            if height > best.1 {
                best = (id, height);
            }
            for child in self.waiting.remove(&id).unwrap_or_default() {
                pending.push((child, height + 1));
            }
        }

        best
    }

    /// The ancestor of `id` at `height`, following recorded parents
    fn ancestor_at(&self, mut id: ObjectId, height: usize) -> Option<ObjectId> {
        let mut current = self.height(&id)?;
        while current > height {
            id = self.blocks.get(&id)?.previous_hash;
            current -= 1;
        }
        Some(id)
    }
}
