// src/kms/local.rs
//! In-process software KMS
//!
//! Holds named 256-bit master keys and wraps data keys with
//! XChaCha20-Poly1305. Blob layout:
//!
//! ```text
//! [version: 1][id_len: 1][master key id: id_len][nonce: 24][wrapped key + tag: 48]
//! ```
//!
//! The master key id travels in the clear so unwrap needs no hint and
//! rotation can tell which records already sit under the target key. It
//! is also bound as associated data, so relabelling a blob fails.

use std::collections::HashMap;

use zeroize::Zeroizing;

use crate::aliases::{DataKey32, MasterKey32};
use crate::consts::{KEY_LEN, WRAP_AAD_PREFIX, WRAP_BLOB_VERSION};
use crate::crypto::cipher::{open, seal};
use crate::error::{CoreError, Result};
use crate::key_ops::{parse_key_material, random_key_bytes};

use super::{DataKey, KeyManagementBackend, MasterKeyId, WrappedKey};

#[derive(Default)]
pub struct LocalKms {
    master_keys: HashMap<MasterKeyId, MasterKey32>,
}

impl LocalKms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(id, key)` pairs where each key is hex or base64 text
    pub fn from_hex_keys<'a>(keys: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let mut kms = Self::new();
        for (id, key) in keys {
            let key = parse_key_material(key)?;
            kms.insert_master_key(MasterKeyId::new(id)?, MasterKey32::new(*key))?;
        }
        Ok(kms)
    }

    pub fn insert_master_key(&mut self, id: MasterKeyId, key: MasterKey32) -> Result<()> {
        if id.as_str().len() > usize::from(u8::MAX) {
            return Err(CoreError::Configuration(format!(
                "master key id is longer than {} bytes",
                u8::MAX
            )));
        }
        self.master_keys.insert(id, key);
        Ok(())
    }

    pub fn contains(&self, id: &MasterKeyId) -> bool {
        self.master_keys.contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        self.master_keys.is_empty()
    }

    fn master_key(&self, id: &MasterKeyId) -> Result<&MasterKey32> {
        self.master_keys.get(id).ok_or_else(|| {
            CoreError::KeyUnavailable(format!("master key {id} is not held by this KMS"))
        })
    }
}

fn wrap_aad(id: &MasterKeyId) -> Vec<u8> {
    format!("{WRAP_AAD_PREFIX}{id}").into_bytes()
}

/// Split a blob into `(master key id, sealed data key)`
fn parse_blob(blob: &[u8]) -> Result<(MasterKeyId, &[u8])> {
    let malformed = || CoreError::KeyUnavailable("wrapped key blob is malformed".into());

    let (&version, rest) = blob.split_first().ok_or_else(malformed)?;
    if version != WRAP_BLOB_VERSION {
        return Err(CoreError::KeyUnavailable(format!(
            "unsupported wrapped key version {version:#04x}"
        )));
    }
    let (&id_len, rest) = rest.split_first().ok_or_else(malformed)?;
    let id_len = usize::from(id_len);
    if rest.len() < id_len {
        return Err(malformed());
    }
    let (id, sealed) = rest.split_at(id_len);
    let id = std::str::from_utf8(id).map_err(|_| malformed())?;
    Ok((MasterKeyId::new(id).map_err(|_| malformed())?, sealed))
}

impl KeyManagementBackend for LocalKms {
    fn name(&self) -> &'static str {
        "local-kms"
    }

    fn generate_data_key(&self, master_key_id: &MasterKeyId) -> Result<DataKey> {
        let master = self.master_key(master_key_id)?;
        let key = random_key_bytes();
        let sealed = seal(master.expose_secret(), &key[..], &wrap_aad(master_key_id))?;

        let id = master_key_id.as_str().as_bytes();
        let mut blob = Vec::with_capacity(2 + id.len() + sealed.len());
        blob.push(WRAP_BLOB_VERSION);
        // insert_master_key caps ids at u8::MAX bytes
        blob.push(id.len() as u8);
        blob.extend_from_slice(id);
        blob.extend_from_slice(&sealed);

        Ok(DataKey::new(DataKey32::new(*key), WrappedKey::from_bytes(blob)))
    }

    fn unwrap_data_key(&self, wrapped: &WrappedKey) -> Result<DataKey32> {
        let (id, sealed) = parse_blob(wrapped.as_bytes())?;
        let master = self.master_key(&id)?;

        let plaintext = Zeroizing::new(
            open(master.expose_secret(), sealed, &wrap_aad(&id)).map_err(|err| match err {
                CoreError::Authentication => CoreError::Authentication,
                _ => CoreError::KeyUnavailable("wrapped key blob is truncated".into()),
            })?,
        );

        let mut bytes: [u8; KEY_LEN] = plaintext.as_slice().try_into().map_err(|_| {
            CoreError::KeyUnavailable("unwrapped data key has the wrong length".into())
        })?;
        let key = DataKey32::new(bytes);
        zeroize::Zeroize::zeroize(&mut bytes);
        Ok(key)
    }

    fn wrapped_by(&self, wrapped: &WrappedKey) -> Option<MasterKeyId> {
        parse_blob(wrapped.as_bytes()).ok().map(|(id, _)| id)
    }
}
