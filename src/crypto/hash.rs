//! Cryptographic hashing utilities for the relay
//!
//! Provides the SHA-256 based digests used for block ids, transaction ids,
//! signing hashes, addresses and merkle nodes, plus the fixed-width
//! identifier those digests are stored as.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Length in bytes of every identifier (one SHA-256 output)
pub const HASH_LENGTH: usize = 32;

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> [u8; HASH_LENGTH] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
pub fn double_sha256(data: &[u8]) -> [u8; HASH_LENGTH] {
    sha256(&sha256(data))
}

/// Computes double SHA-256 hash and returns it as a hex string
pub fn double_sha256_hex(data: &[u8]) -> String {
    hex::encode(double_sha256(data))
}

#[derive(Error, Debug)]
pub enum ObjectIdError {
    #[error("Invalid identifier length: {0} bytes (expected {HASH_LENGTH})")]
    InvalidLength(usize),
    #[error("Invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Canonical 32-byte identifier of a block or transaction
///
/// The all-zero value is reserved as "no parent" and is what the genesis
/// block carries as its previous hash.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId([u8; HASH_LENGTH]);

impl ObjectId {
    pub const NULL: ObjectId = ObjectId([0u8; HASH_LENGTH]);

    pub const fn new(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Identifier of arbitrary bytes under the double SHA-256 rule
    pub fn digest(data: &[u8]) -> Self {
        Self(double_sha256(data))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ObjectIdError> {
        let array: [u8; HASH_LENGTH] = bytes
            .try_into()
            .map_err(|_| ObjectIdError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }

    pub fn from_hex(s: &str) -> Result<Self, ObjectIdError> {
        Self::from_slice(&hex::decode(s)?)
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; HASH_LENGTH]
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; HASH_LENGTH]> for ObjectId {
    fn from(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for ObjectId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}
