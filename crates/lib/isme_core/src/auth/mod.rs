//! Credential primitives.
//!
//! Password hashing, JWT signing/verification, and the context-bound cipher
//! for registered application secrets. Everything here is stateless.

pub mod cipher;
pub mod jwt;
pub mod password;

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Token codec errors.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error("Invalid verification key: {0}")]
    InvalidKey(String),

    #[error("Invalid token")]
    InvalidToken,
}

/// Secret cipher errors.
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed")]
    DecryptionFailed,
}

/// Password hashing errors.
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Stored password hash is malformed: {0}")]
    MalformedHash(String),
}

/// SHA-256 hash a token for storage. Hex encoded.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
