// src/aliases.rs
//! Re-exports secure-gate's ergonomic secret types
//!
//! These are the canonical key types used throughout encrypted-field-vault.
//! All of them zeroize on drop.

pub use secure_gate::fixed_alias;

// Fixed-size secrets
fixed_alias!(DataKey32, 32); // per-record data key, plaintext form
fixed_alias!(StaticKey32, 32); // STATIC_SYMMETRIC_KEY, local-key mode
fixed_alias!(MasterKey32, 32); // master key held inside LocalKms only
