//! Merkle root calculation for a block's transaction list
//!
//! Leaves are the double SHA-256 of each transaction's full encoding
//! (not its signing hash). Each level pairs hashes left to right and
//! duplicates the last hash when the level has an odd count.

use super::hash::{ObjectId, HASH_LENGTH};
use crate::core::transaction::Transaction;
use thiserror::Error;

/// Merkle calculation errors
#[derive(Error, Debug)]
pub enum MerkleError {
    #[error("Cannot compute a merkle root of an empty transaction list")]
    EmptyTransactionList,
    #[error("Failed to encode transaction: {0}")]
    Encode(#[from] bincode::Error),
}

/// Calculate the merkle root committing to an ordered transaction list
pub fn calculate_merkle_root(transactions: &[Transaction]) -> Result<ObjectId, MerkleError> {
    let leaves = transactions
        .iter()
        .map(|tx| Ok(ObjectId::digest(&tx.to_bytes()?)))
        .collect::<Result<Vec<_>, bincode::Error>>()?;

    merkle_root_from_leaves(&leaves).ok_or(MerkleError::EmptyTransactionList)
}

/// Fold a leaf level up to its root; `None` when there are no leaves
pub fn merkle_root_from_leaves(leaves: &[ObjectId]) -> Option<ObjectId> {
    if leaves.is_empty() {
        return None;
    }

    let mut level: Vec<ObjectId> = leaves.to_vec();

    while level.len() > 1 {
        if level.len() % 2 != 0 {
            let last = level[level.len() - 1];
            level.push(last);
        }

        level = level
            .chunks_exact(2)
            .map(|pair| combine(&pair[0], &pair[1]))
            .collect();
    }

    level.pop()
}

fn combine(left: &ObjectId, right: &ObjectId) -> ObjectId {
    let mut data = [0u8; HASH_LENGTH * 2];
    data[..HASH_LENGTH].copy_from_slice(left.as_bytes());
    data[HASH_LENGTH..].copy_from_slice(right.as_bytes());
    ObjectId::digest(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::{InEntry, OutEntry};
    use chrono::{TimeZone, Utc};

    fn tx(amount: u64) -> Transaction {
        Transaction::new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            vec![InEntry::new(ObjectId::digest(b"prev"), 0)],
            vec![OutEntry {
                recipient: ObjectId::digest(b"bob"),
                amount,
            }],
        )
    }

    fn leaf(tx: &Transaction) -> ObjectId {
        ObjectId::digest(&tx.to_bytes().unwrap())
    }

    fn concat_hash(a: &ObjectId, b: &ObjectId) -> ObjectId {
        let mut data = a.as_bytes().to_vec();
        data.extend_from_slice(b.as_bytes());
        ObjectId::digest(&data)
    }

    #[test]
    fn test_merkle_root_single() {
        let a = tx(1);
        let root = calculate_merkle_root(&[a.clone()]).unwrap();
        assert_eq!(root, leaf(&a));
    }

    #[test]
    fn test_merkle_root_two() {
        let (a, b) = (tx(1), tx(2));
        let root = calculate_merkle_root(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(root, concat_hash(&leaf(&a), &leaf(&b)));
    }

    #[test]
    fn test_merkle_root_odd_duplicates_last() {
        let (a, b, c) = (tx(1), tx(2), tx(3));
        let root = calculate_merkle_root(&[a.clone(), b.clone(), c.clone()]).unwrap();

        let left = concat_hash(&leaf(&a), &leaf(&b));
        let right = concat_hash(&leaf(&c), &leaf(&c));
        assert_eq!(root, concat_hash(&left, &right));
    }

    #[test]
    fn test_merkle_root_order_sensitive() {
        let (a, b, c) = (tx(1), tx(2), tx(3));
        let forward = calculate_merkle_root(&[a.clone(), b.clone(), c.clone()]).unwrap();
        let swapped = calculate_merkle_root(&[b.clone(), a.clone(), c.clone()]).unwrap();
        let rotated = calculate_merkle_root(&[c, a, b]).unwrap();
        assert_ne!(forward, swapped);
        assert_ne!(forward, rotated);
    }

    #[test]
    fn test_merkle_root_uses_full_encoding() {
        let mut signed = tx(1);
        let unsigned = signed.clone();
        signed.in_entries[0].signature = Some(vec![7u8; 64]);

        assert_ne!(
            calculate_merkle_root(&[signed]).unwrap(),
            calculate_merkle_root(&[unsigned]).unwrap()
        );
    }

    #[test]
    fn test_empty_merkle_root_is_error() {
        assert!(matches!(
            calculate_merkle_root(&[]),
            Err(MerkleError::EmptyTransactionList)
        ));
        assert!(merkle_root_from_leaves(&[]).is_none());
    }

    #[test]
    fn test_five_leaves() {
        let leaves: Vec<ObjectId> = (0u8..5).map(|i| ObjectId::digest(&[i])).collect();
        let l1 = [
            concat_hash(&leaves[0], &leaves[1]),
            concat_hash(&leaves[2], &leaves[3]),
            concat_hash(&leaves[4], &leaves[4]),
        ];
        let l2 = [concat_hash(&l1[0], &l1[1]), concat_hash(&l1[2], &l1[2])];
        let expected = concat_hash(&l2[0], &l2[1]);
        assert_eq!(merkle_root_from_leaves(&leaves), Some(expected));
    }
}
