// src/key_ops.rs
//! Key generation, parsing and fingerprinting utilities
//!
//! Raw key bytes only ever live in `Zeroizing` buffers or secure-gate
//! aliases; nothing here logs or formats key material.

use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::consts::{FINGERPRINT_HEX_LEN, KEY_LEN};
use crate::error::{CoreError, Result};

/// Generate 256 fresh random bits from the thread-local CSPRNG
pub fn random_key_bytes() -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    rand::rng().fill_bytes(&mut key[..]);
    key
}

/// Parse a 256-bit key from config text.
///
/// Accepts 64 hex characters, or base64 (URL-safe as produced by Fernet
/// style tooling, or standard alphabet, padded or not).
pub fn parse_key_material(text: &str) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CoreError::Configuration("key material is empty".into()));
    }

    let decoded = Zeroizing::new(
        if text.len() == KEY_LEN * 2 && text.bytes().all(|b| b.is_ascii_hexdigit()) {
            hex::decode(text).map_err(|_| invalid_key_material())?
        } else {
            URL_SAFE
                .decode(text)
                .or_else(|_| URL_SAFE_NO_PAD.decode(text))
                .or_else(|_| STANDARD.decode(text))
                .map_err(|_| invalid_key_material())?
        },
    );

    if decoded.len() != KEY_LEN {
        return Err(CoreError::Configuration(format!(
            "key material must decode to {KEY_LEN} bytes, got {}",
            decoded.len()
        )));
    }

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&decoded);
    Ok(key)
}

fn invalid_key_material() -> CoreError {
    CoreError::Configuration("key material is neither 64 hex chars nor base64".into())
}

/// Short BLAKE3 fingerprint for logs — identifies a blob without revealing it
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hex = blake3::hash(bytes).to_hex().to_string();
    hex.truncate(FINGERPRINT_HEX_LEN);
    hex
}
