// src/crypto/mod.rs
//! Pure cryptographic operations — no I/O, no database, no KMS
//!
//! `cipher` is the authenticated primitive, `envelope` the at-rest
//! container that pairs a ciphertext with its wrapped data key.

pub mod cipher;
pub mod envelope;

pub use cipher::{decrypt_token, encrypt_to_token};
pub use envelope::{pack, unpack, Unpacked};
