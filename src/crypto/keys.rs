//! ECDSA keys for signing transaction inputs
//!
//! Signatures are made over a transaction's sign hash, so a key pair only
//! ever signs 32-byte identifiers.

use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::ObjectId;
use crate::core::identity::to_address;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        let public_key = PublicKey::from_secret_key(&Secp256k1::new(), &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// Compressed SEC1 encoding, as carried in an input entry
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public_key.serialize().to_vec()
    }

    pub fn address(&self) -> ObjectId {
        to_address(&self.public_key_bytes())
    }

    /// Sign a 32-byte hash, returning the compact signature
    pub fn sign(&self, hash: &ObjectId) -> Vec<u8> {
        let message = Message::from_digest(*hash.as_bytes());
        Secp256k1::new()
            .sign_ecdsa(&message, &self.secret_key)
            .serialize_compact()
            .to_vec()
    }
}

/// Verify a compact signature over `hash` against an encoded public key
pub fn verify_signature(
    public_key: &[u8],
    hash: &ObjectId,
    signature: &[u8],
) -> Result<bool, KeyError> {
    let public_key = PublicKey::from_slice(public_key).map_err(|_| KeyError::InvalidPublicKey)?;
    let signature = Signature::from_compact(signature).map_err(|_| KeyError::InvalidSignature)?;
    let message = Message::from_digest(*hash.as_bytes());

    Ok(Secp256k1::verification_only()
        .verify_ecdsa(&message, &signature, &public_key)
        .is_ok())
}
