// src/crypto/cipher.rs
//! XChaCha20-Poly1305 field tokens
//!
//! Token text is URL-safe base64 (no padding) of
//! `[version: 1][nonce: 24][ciphertext + Poly1305 tag: N + 16]`.
//! The version byte is bound to the ciphertext as associated data, so
//! it cannot be swapped without failing authentication.

#[allow(deprecated)] // upstream generic-array 0.x deprecation
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

use crate::consts::{KEY_LEN, NONCE_LEN, TAG_LEN, TOKEN_VERSION};
use crate::error::{CoreError, Result};

/// Encrypt `plaintext` under a raw 256-bit key → self-describing token
pub fn encrypt_to_token(plaintext: &[u8], key: &[u8; KEY_LEN]) -> Result<String> {
    let sealed = seal(key, plaintext, &[TOKEN_VERSION])?;

    let mut raw = Vec::with_capacity(1 + sealed.len());
    raw.push(TOKEN_VERSION);
    raw.extend_from_slice(&sealed);
    Ok(URL_SAFE_NO_PAD.encode(raw))
}

/// Decrypt a token produced by [`encrypt_to_token`]
///
/// A token that cannot be parsed fails with `MalformedEnvelope`; a token
/// that parses but does not authenticate under `key` fails with
/// `Authentication`. Unauthenticated bytes are never returned.
pub fn decrypt_token(token: &str, key: &[u8; KEY_LEN]) -> Result<Vec<u8>> {
    let raw = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|_| CoreError::MalformedEnvelope("token is not valid base64url".into()))?;

    let (version, sealed) = raw
        .split_first()
        .ok_or_else(|| CoreError::MalformedEnvelope("token is empty".into()))?;

    if *version != TOKEN_VERSION {
        return Err(CoreError::MalformedEnvelope(format!(
            "unsupported token version {version:#04x}"
        )));
    }

    open(key, sealed, &[*version])
}

/// `true` when `text` has the layout of a token, without authenticating it
pub fn is_token(text: &str) -> bool {
    URL_SAFE_NO_PAD
        .decode(text.trim())
        .is_ok_and(|raw| {
            raw.first() == Some(&TOKEN_VERSION) && raw.len() >= 1 + NONCE_LEN + TAG_LEN
        })
}

/// AEAD-encrypt → `[nonce][ciphertext + tag]` with a fresh random nonce
#[allow(deprecated)]
pub(crate) fn seal(key: &[u8; KEY_LEN], msg: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.into());

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg, aad })
        .map_err(|_| CoreError::MalformedEnvelope("payload too large to encrypt".into()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Inverse of [`seal`]
#[allow(deprecated)]
pub(crate) fn open(key: &[u8; KEY_LEN], sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(CoreError::MalformedEnvelope(
            "sealed payload is shorter than nonce + tag".into(),
        ));
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce = XNonce::from_slice(nonce_bytes);
    let cipher = XChaCha20Poly1305::new(key.into());

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CoreError::Authentication)
}
