// src/kms/fallback.rs
//! Development-only stand-in for a KMS
//!
//! The "wrapped" key is the raw data key itself: anyone who can read the
//! wrapped-key column can decrypt the field. This keeps envelope-shaped
//! rows flowing through dev and test setups without a KMS, and is loudly
//! labelled so it is never mistaken for real protection.

use tracing::warn;

use crate::aliases::DataKey32;
use crate::consts::KEY_LEN;
use crate::error::{CoreError, Result};
use crate::key_ops::random_key_bytes;

use super::{DataKey, KeyManagementBackend, MasterKeyId, WrappedKey};

pub struct LocalFallback {
    _private: (),
}

impl LocalFallback {
    pub fn new() -> Self {
        warn!(
            "KMS unavailable: using LocalFallback; wrapped keys are stored UNPROTECTED (development only)"
        );
        Self { _private: () }
    }
}

impl Default for LocalFallback {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyManagementBackend for LocalFallback {
    fn name(&self) -> &'static str {
        "local-fallback"
    }

    fn generate_data_key(&self, master_key_id: &MasterKeyId) -> Result<DataKey> {
        warn!(
            master_key_id = %master_key_id,
            "LocalFallback generated a data key; its wrapped form is the raw key"
        );
        let key = random_key_bytes();
        Ok(DataKey::new(
            DataKey32::new(*key),
            WrappedKey::from_bytes(key.to_vec()),
        ))
    }

    fn unwrap_data_key(&self, wrapped: &WrappedKey) -> Result<DataKey32> {
        let bytes: [u8; KEY_LEN] = wrapped.as_bytes().try_into().map_err(|_| {
            CoreError::KeyUnavailable(format!(
                "LocalFallback expects a raw {KEY_LEN}-byte key, got {} bytes",
                wrapped.as_bytes().len()
            ))
        })?;
        Ok(DataKey32::new(bytes))
    }

    fn is_development_only(&self) -> bool {
        true
    }
}
