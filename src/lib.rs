// src/lib.rs
//! encrypted-field-vault — encryption-at-rest for sensitive text fields
//!
//! Features:
//! - XChaCha20-Poly1305 field tokens
//! - KMS envelope encryption with a fresh data key per record
//!   (in-process `LocalKms`, or AWS KMS behind the `aws-kms` feature)
//! - Static-key and plaintext modes, readable across config changes
//! - Online key rotation with dry-run and confirmation gates
//! - Full secure-gate v0.5 integration for key material

pub mod aliases;
pub mod config;
pub mod consts;
pub mod crypto;
pub mod db;
pub mod encryptor;
pub mod enums;
pub mod error;
pub mod key_ops;
pub mod kms;
pub mod record;
pub mod rotation;

// Re-export everything users need at the crate root
pub use aliases::{DataKey32, MasterKey32, StaticKey32};
pub use config::{load as load_config, Config};
pub use encryptor::{DecryptedText, FieldEncryptor, FieldEncryptorBuilder};
pub use enums::{KmsBackendKind, RotationMode, Scheme};
pub use error::{CoreError, ErrorKind, Result as CoreResult};
pub use kms::{KeyManagementBackend, LocalFallback, LocalKms, MasterKeyId, WrappedKey};
pub use record::EncryptedRecord;
pub use rotation::{RotationJob, RotationOptions, RotationReport, RunLock};
