//! AES-256-GCM encryption for stored credential payloads.
//!
//! The administrator secret is a base64 encoded 32-byte key shared by every
//! record. Each payload gets its own random nonce, and each record carries a
//! short fingerprint of the key so a rotated secret is told apart from
//! corrupted data.

use crate::error::StoreError;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};

/// Size of the encryption key in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits, standard for GCM)
const NONCE_SIZE: usize = 12;

/// Hex characters kept from the key digest.
const FINGERPRINT_LEN: usize = 16;

/// Decodes the administrator secret and checks it is exactly 32 bytes.
pub fn validate_key(key_base64: &str) -> Result<Vec<u8>, StoreError> {
    let key_bytes = BASE64
        .decode(key_base64.trim())
        .map_err(|e| StoreError::InvalidKey(format!("not valid base64: {}", e)))?;

    if key_bytes.len() != KEY_SIZE {
        return Err(StoreError::InvalidKey(format!(
            "must be {} bytes (256 bits), got {} bytes",
            KEY_SIZE,
            key_bytes.len()
        )));
    }

    Ok(key_bytes)
}

/// Short, non-reversible identifier of a key.
pub fn key_fingerprint(key: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"squash-credentials:");
    hasher.update(key);
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(FINGERPRINT_LEN);
    digest
}

/// Encrypts `plaintext`, returning `(ciphertext, nonce)`, both base64.
pub fn encrypt(plaintext: &str, key: &[u8]) -> Result<(String, String), StoreError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| StoreError::Encryption(format!("failed to create cipher: {}", e)))?;

    let nonce_bytes = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext_bytes = cipher
        .encrypt(&nonce_bytes, plaintext.as_bytes())
        .map_err(|e| StoreError::Encryption(e.to_string()))?;

    Ok((BASE64.encode(&ciphertext_bytes), BASE64.encode(nonce_bytes)))
}

/// Decrypts a payload produced by [`encrypt`].
///
/// Returns `None` when authentication fails (wrong key, corrupted or
/// tampered data); the store decides how to report it.
pub fn decrypt(ciphertext: &str, nonce: &str, key: &[u8]) -> Option<String> {
    let ciphertext_bytes = BASE64.decode(ciphertext).ok()?;
    let nonce_bytes = BASE64.decode(nonce).ok()?;

    if nonce_bytes.len() != NONCE_SIZE {
        return None;
    }

    let cipher = Aes256Gcm::new_from_slice(key).ok()?;
    let plaintext_bytes = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext_bytes.as_ref())
        .ok()?;

    String::from_utf8(plaintext_bytes).ok()
}
