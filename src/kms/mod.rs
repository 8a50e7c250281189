// src/kms/mod.rs
//! Key management backends
//!
//! A backend hands out fresh per-record data keys and unwraps previously
//! wrapped ones. Master key material never leaves the backend: callers
//! only ever see a [`MasterKeyId`] and opaque [`WrappedKey`] bytes.
//!
//! Backends are constructed explicitly at startup and shared as
//! `Arc<dyn KeyManagementBackend>`; every call is one round trip with a
//! single typed failure and no internal retries.

#[cfg(feature = "aws-kms")]
mod aws;
mod fallback;
mod local;

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use tracing::warn;

use crate::aliases::DataKey32;
use crate::config::Config;
use crate::consts::KEY_LEN;
use crate::enums::KmsBackendKind;
use crate::error::{CoreError, Result};
use crate::key_ops::fingerprint;

#[cfg(feature = "aws-kms")]
pub use aws::AwsKms;
pub use fallback::LocalFallback;
pub use local::LocalKms;

/// Opaque KMS key id or alias
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MasterKeyId(String);

impl MasterKeyId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into().trim().to_owned();
        if id.is_empty() {
            return Err(CoreError::Configuration("master key id is empty".into()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MasterKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A data key encrypted by a master key — persisted, opaque outside the backend
#[derive(Clone, PartialEq, Eq)]
pub struct WrappedKey(Vec<u8>);

impl WrappedKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Decode the stored text form
    pub fn from_base64(text: &str) -> Result<Self> {
        STANDARD
            .decode(text.trim())
            .map(Self)
            .map_err(|_| CoreError::MalformedEnvelope("wrapped key is not valid base64".into()))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.0)
    }
}

impl fmt::Debug for WrappedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WrappedKey({})", self.fingerprint())
    }
}

/// A freshly generated data key: plaintext for this call only, plus its wrapped form.
///
/// The plaintext half zeroizes on drop; use [`DataKey::into_wrapped`] to
/// discard it as soon as the payload has been encrypted.
pub struct DataKey {
    plaintext: DataKey32,
    wrapped: WrappedKey,
}

impl DataKey {
    pub fn new(plaintext: DataKey32, wrapped: WrappedKey) -> Self {
        Self { plaintext, wrapped }
    }

    pub fn plaintext(&self) -> &[u8; KEY_LEN] {
        self.plaintext.expose_secret()
    }

    pub fn wrapped(&self) -> &WrappedKey {
        &self.wrapped
    }

    /// Drop the plaintext key, keep what gets persisted
    pub fn into_wrapped(self) -> WrappedKey {
        self.wrapped
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataKey")
            .field("plaintext", &"[REDACTED]")
            .field("wrapped", &self.wrapped)
            .finish()
    }
}

/// Abstraction over an external Key Management Service
pub trait KeyManagementBackend: Send + Sync {
    /// Short backend name for logs and reports
    fn name(&self) -> &'static str;

    /// Ask the KMS for a new data key under `master_key_id`
    fn generate_data_key(&self, master_key_id: &MasterKeyId) -> Result<DataKey>;

    /// Ask the KMS to decrypt a wrapped data key
    ///
    /// Fails with `KeyUnavailable` when the KMS is unreachable, denies the
    /// request or cannot parse the blob.
    fn unwrap_data_key(&self, wrapped: &WrappedKey) -> Result<DataKey32>;

    /// The master key a blob was wrapped under, when the blob format reveals it
    fn wrapped_by(&self, _wrapped: &WrappedKey) -> Option<MasterKeyId> {
        None
    }

    /// `true` for backends that must never protect production data
    fn is_development_only(&self) -> bool {
        false
    }
}

/// Build the backend selected by `config`.
///
/// Returns `Ok(None)` when no KMS is configured and the weak fallback is
/// disabled; envelope records then fail with `KeyUnavailable` on read.
pub fn backend_from_config(config: &Config) -> Result<Option<Arc<dyn KeyManagementBackend>>> {
    match config.kms.backend {
        KmsBackendKind::Local => {
            let kms = LocalKms::from_hex_keys(
                config
                    .kms
                    .local_master_keys
                    .iter()
                    .map(|(id, key)| (id.as_str(), key.as_str())),
            )?;
            if kms.is_empty() {
                return Err(CoreError::Configuration(
                    "kms.backend = \"local\" but kms.local_master_keys is empty".into(),
                ));
            }
            Ok(Some(Arc::new(kms)))
        }
        #[cfg(feature = "aws-kms")]
        KmsBackendKind::Aws => Ok(Some(Arc::new(AwsKms::connect(
            config.kms.aws_region.as_deref(),
            config.kms.aws_endpoint.as_deref(),
        )?))),
        #[cfg(not(feature = "aws-kms"))]
        KmsBackendKind::Aws => Err(CoreError::Configuration(
            "kms.backend = \"aws\" needs the aws-kms feature".into(),
        )),
        KmsBackendKind::None if config.features.allow_weak_key_fallback => {
            Ok(Some(Arc::new(LocalFallback::new())))
        }
        KmsBackendKind::None => {
            if config.keys.master_key_id.is_some() {
                return Err(CoreError::Configuration(
                    "MASTER_KEY_ID is set but no KMS backend is configured and the weak local fallback is disabled".into(),
                ));
            }
            warn!("no KMS backend configured; envelope-encrypted records cannot be read");
            Ok(None)
        }
    }
}
