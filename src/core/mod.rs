//! Core chain components
//!
//! This module contains:
//! - Blocks and transactions (wire data model)
//! - Canonical identifiers and signing hashes
//! - Ancestor walks and fork-point detection
//! - The block executor boundary

pub mod block;
pub mod chain;
pub mod executor;
pub mod identity;
pub mod transaction;

pub use block::Block;
pub use chain::{ancestors, lowest_common_ancestor, Ancestors, BlockLookup};
pub use executor::{BlockExecutor, ChannelExecutor, ForkTracker, TipUpdate};
pub use identity::{
    compute_block_id, compute_transaction_id, deserialize_block, deserialize_transaction,
    get_transaction_sign_hash, to_address, verify_input_signatures, IdentityError,
};
pub use transaction::{InEntry, OutEntry, Transaction};
