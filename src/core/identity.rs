//! Canonical identifiers
//!
//! - A block id is the double hash of its header re-encoded with both
//!   transaction lists cleared, so the same header has one id however its
//!   transactions were shipped.
//! - A transaction id is the double hash of its exact wire bytes.
//! - A transaction sign hash is the double hash of the transaction
//!   re-encoded with every input's public key and signature cleared.

use crate::core::block::Block;
use crate::core::transaction::Transaction;
use crate::crypto::{verify_signature, KeyError, ObjectId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Malformed object encoding: {0}")]
    Decode(#[from] bincode::Error),
    #[error("Input {0} is missing its public key or signature")]
    Unsigned(usize),
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
}

pub fn compute_block_id(data: &[u8]) -> Result<ObjectId, IdentityError> {
    let mut header = Block::from_bytes(data)?;
    header.transaction_ids = None;
    header.transactions = None;
    Ok(ObjectId::digest(&header.to_bytes()?))
}

pub fn compute_transaction_id(data: &[u8]) -> ObjectId {
    ObjectId::digest(data)
}

pub fn get_transaction_sign_hash(data: &[u8]) -> Result<ObjectId, IdentityError> {
    let mut tx = Transaction::from_bytes(data)?;
    for entry in &mut tx.in_entries {
        entry.public_key = None;
        entry.signature = None;
    }
    Ok(ObjectId::digest(&tx.to_bytes()?))
}

pub fn to_address(public_key: &[u8]) -> ObjectId {
    ObjectId::digest(public_key)
}

/// Parse a block and fill in its id and original bytes
pub fn deserialize_block(data: &[u8]) -> Result<Block, IdentityError> {
    let mut block = Block::from_bytes(data)?;
    block.id = compute_block_id(data)?;
    block.original = data.to_vec();
    Ok(block)
}

/// Parse a transaction and fill in its id and original bytes
pub fn deserialize_transaction(data: &[u8]) -> Result<Transaction, IdentityError> {
    let mut tx = Transaction::from_bytes(data)?;
    tx.id = compute_transaction_id(data);
    tx.original = data.to_vec();
    Ok(tx)
}

/// Verify every input signature of a raw transaction against its sign hash
///
/// Returns `Ok(false)` on a well-formed but wrong signature.
pub fn verify_input_signatures(data: &[u8]) -> Result<bool, IdentityError> {
    let tx = Transaction::from_bytes(data)?;
    let sign_hash = get_transaction_sign_hash(data)?;

    for (index, entry) in tx.in_entries.iter().enumerate() {
        let (Some(public_key), Some(signature)) = (&entry.public_key, &entry.signature) else {
            return Err(IdentityError::Unsigned(index));
        };
        if !verify_signature(public_key, &sign_hash, signature)? {
            return Ok(false);
        }
    }

    Ok(true)
}
