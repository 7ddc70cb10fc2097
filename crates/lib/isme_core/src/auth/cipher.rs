//! AES-256-GCM encryption for registered application secrets.
//!
//! The context tag (`ctx_info`) is bound as associated data, so a ciphertext
//! produced for one context fails authentication under any other. Output is
//! base64-encoded `nonce || ciphertext || tag`.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::CipherError;
use crate::ids::random_alphanumeric;

/// Nonce size for AES-256-GCM (12 bytes).
const NONCE_SIZE: usize = 12;
/// AES-256 key size (32 bytes).
const KEY_SIZE: usize = 32;
/// GCM tag size (16 bytes).
const TAG_SIZE: usize = 16;
/// Length of generated application secrets.
pub const APP_SECRET_LEN: usize = 24;

/// Derive a 32-byte key from a passphrase using SHA-256.
fn derive_key(passphrase: &str) -> [u8; KEY_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(passphrase.as_bytes());
    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&hasher.finalize());
    key
}

fn cipher_for(passphrase: &str) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derive_key(passphrase)))
}

/// Encrypt `plaintext` for use under `context`.
pub fn encrypt(plaintext: &str, key: &str, context: &str) -> Result<String, CipherError> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher_for(key)
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext.as_bytes(),
                aad: context.as_bytes(),
            },
        )
        .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;

    let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(&combined))
}

/// Decrypt a value produced by [`encrypt`] under the same key and context.
pub fn decrypt(ciphertext_b64: &str, key: &str, context: &str) -> Result<String, CipherError> {
    let combined = STANDARD
        .decode(ciphertext_b64)
        .map_err(|_| CipherError::DecryptionFailed)?;
    if combined.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CipherError::DecryptionFailed);
    }

    let (nonce, ciphertext) = combined.split_at(NONCE_SIZE);
    let plaintext = cipher_for(key)
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: context.as_bytes(),
            },
        )
        .map_err(|_| CipherError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| CipherError::DecryptionFailed)
}

/// Generate a fresh plaintext application secret.
pub fn generate_secret() -> String {
    random_alphanumeric(APP_SECRET_LEN)
}
