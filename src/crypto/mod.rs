//! Cryptographic utilities for the relay
//!
//! This module provides:
//! - SHA-256 / double SHA-256 hashing and the 32-byte identifier type
//! - Merkle root calculation
//! - ECDSA key management (secp256k1)

pub mod hash;
pub mod keys;
pub mod merkle;

pub use hash::{double_sha256, double_sha256_hex, sha256, ObjectId, ObjectIdError, HASH_LENGTH};
pub use keys::{verify_signature, KeyError, KeyPair};
pub use merkle::{calculate_merkle_root, merkle_root_from_leaves, MerkleError};
