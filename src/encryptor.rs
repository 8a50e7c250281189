// src/encryptor.rs
//! `FieldEncryptor` — transparent encryption of sensitive text fields
//!
//! Write mode is chosen once, at construction, in fixed priority:
//!
//! 1. master key id configured → fresh data key per call, packed envelope
//! 2. static key configured → direct token, no envelope
//! 3. plaintext passthrough (opt-in via `allow_plaintext_storage`)
//!
//! Reads infer the scheme from the stored shape, so rows written under any
//! earlier mode stay readable after the configuration changes.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::aliases::StaticKey32;
use crate::config::Config;
use crate::consts::UNDECRYPTABLE_PLACEHOLDER;
use crate::crypto::cipher::{decrypt_token, encrypt_to_token};
use crate::crypto::envelope::pack;
use crate::enums::Scheme;
use crate::error::{CoreError, ErrorKind, Result};
use crate::key_ops::parse_key_material;
use crate::kms::{backend_from_config, KeyManagementBackend, MasterKeyId, WrappedKey};
use crate::record::{EncryptedRecord, StoredForm};

pub struct FieldEncryptor {
    master_key_id: Option<MasterKeyId>,
    static_key: Option<StaticKey32>,
    backend: Option<Arc<dyn KeyManagementBackend>>,
}

#[derive(Default)]
pub struct FieldEncryptorBuilder {
    master_key_id: Option<MasterKeyId>,
    static_key: Option<StaticKey32>,
    backend: Option<Arc<dyn KeyManagementBackend>>,
    allow_plaintext: bool,
}

/// Result of a tolerant read: the plaintext, or the untouched stored text
/// plus the reason it could not be decrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedText {
    pub text: String,
    pub failed: Option<ErrorKind>,
}

impl DecryptedText {
    pub fn is_ok(&self) -> bool {
        self.failed.is_none()
    }

    /// What an end user should see for this field
    pub fn display_text(&self) -> &str {
        match self.failed {
            None => &self.text,
            Some(_) => UNDECRYPTABLE_PLACEHOLDER,
        }
    }
}

impl FieldEncryptorBuilder {
    pub fn master_key_id(mut self, id: MasterKeyId) -> Self {
        self.master_key_id = Some(id);
        self
    }

    pub fn static_key(mut self, key: StaticKey32) -> Self {
        self.static_key = Some(key);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn KeyManagementBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn allow_plaintext(mut self, allow: bool) -> Self {
        self.allow_plaintext = allow;
        self
    }

    pub fn build(self) -> Result<FieldEncryptor> {
        if self.master_key_id.is_some() && self.backend.is_none() {
            return Err(CoreError::Configuration(
                "a master key id is configured but no KMS backend is available".into(),
            ));
        }
        if self.master_key_id.is_none() && self.static_key.is_none() && !self.allow_plaintext {
            return Err(CoreError::Configuration(
                "no master key id or static key configured and plaintext storage is not allowed"
                    .into(),
            ));
        }

        let encryptor = FieldEncryptor {
            master_key_id: self.master_key_id,
            static_key: self.static_key,
            backend: self.backend,
        };

        match encryptor.write_scheme() {
            Scheme::Plaintext => warn!(
                "no encryption key configured: sensitive fields will be stored as PLAINTEXT"
            ),
            scheme => info!(
                %scheme,
                backend = encryptor.backend.as_ref().map(|b| b.name()).unwrap_or("none"),
                "field encryption enabled"
            ),
        }
        if let (Some(id), Some(backend)) = (&encryptor.master_key_id, &encryptor.backend) {
            if backend.is_development_only() {
                warn!(
                    master_key_id = %id,
                    backend = backend.name(),
                    "envelope mode is backed by a development-only KMS stand-in"
                );
            }
        }

        Ok(encryptor)
    }
}

impl FieldEncryptor {
    pub fn builder() -> FieldEncryptorBuilder {
        FieldEncryptorBuilder::default()
    }

    /// Construct from loaded config, including the KMS backend it selects
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder =
            Self::builder().allow_plaintext(config.features.allow_plaintext_storage);

        if let Some(backend) = backend_from_config(config)? {
            builder = builder.backend(backend);
        }
        if let Some(id) = config.keys.master_key_id.as_deref() {
            builder = builder.master_key_id(MasterKeyId::new(id)?);
        }
        if let Some(key) = config.keys.static_symmetric_key.as_deref() {
            builder = builder.static_key(StaticKey32::new(*parse_key_material(key)?));
        }

        builder.build()
    }

    /// The scheme new writes will use
    pub fn write_scheme(&self) -> Scheme {
        if self.master_key_id.is_some() {
            Scheme::KmsEnvelope
        } else if self.static_key.is_some() {
            Scheme::LocalStatic
        } else {
            Scheme::Plaintext
        }
    }

    pub fn master_key_id(&self) -> Option<&MasterKeyId> {
        self.master_key_id.as_ref()
    }

    pub fn backend(&self) -> Option<&Arc<dyn KeyManagementBackend>> {
        self.backend.as_ref()
    }

    pub fn encrypt_text(&self, plaintext: &str) -> Result<EncryptedRecord> {
        if let (Some(id), Some(backend)) = (&self.master_key_id, &self.backend) {
            return seal_envelope(backend.as_ref(), id, plaintext.as_bytes());
        }
        if let Some(key) = &self.static_key {
            let token = encrypt_to_token(plaintext.as_bytes(), key.expose_secret())?;
            return Ok(EncryptedRecord::new(token, None));
        }
        debug!("plaintext passthrough: storing field unencrypted");
        let record = EncryptedRecord::new(plaintext, None);
        if matches!(record.resolve(false)?, StoredForm::Envelope { .. }) {
            return Err(CoreError::MalformedEnvelope(
                "plaintext has the shape of a sealed envelope and would not read back".into(),
            ));
        }
        Ok(record)
    }

    pub fn decrypt_text(&self, record: &EncryptedRecord) -> Result<String> {
        let bytes = match record.resolve(self.static_key.is_some())? {
            StoredForm::Envelope { token, wrapped_key } => {
                let backend = self.backend.as_ref().ok_or_else(|| {
                    CoreError::KeyUnavailable(
                        "record is envelope-encrypted but no KMS backend is configured".into(),
                    )
                })?;
                let wrapped = WrappedKey::from_base64(&wrapped_key)?;
                open_envelope(backend.as_ref(), &token, &wrapped)?
            }
            StoredForm::LocalStatic(token) => {
                let key = self.static_key.as_ref().ok_or_else(|| {
                    CoreError::Configuration("static key disappeared during read".into())
                })?;
                decrypt_token(token, key.expose_secret())?
            }
            StoredForm::Plaintext(text) => return Ok(text.to_owned()),
        };

        utf8(bytes)
    }

    /// Decrypt, degrading to the untouched stored text plus an error flag
    pub fn decrypt_text_or_raw(&self, record: &EncryptedRecord) -> DecryptedText {
        match self.decrypt_text(record) {
            Ok(text) => DecryptedText { text, failed: None },
            Err(err) => {
                warn!(error_kind = %err.kind(), "field could not be decrypted; returning stored text");
                DecryptedText {
                    text: record.ciphertext.clone(),
                    failed: Some(err.kind()),
                }
            }
        }
    }

    /// Decrypt many fields; one bad record never fails the others
    pub fn decrypt_all(&self, records: &[EncryptedRecord]) -> Vec<Result<String>> {
        records.iter().map(|r| self.decrypt_text(r)).collect()
    }
}

impl fmt::Debug for FieldEncryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldEncryptor")
            .field("write_scheme", &self.write_scheme())
            .field("master_key_id", &self.master_key_id)
            .field("static_key", &self.static_key.as_ref().map(|_| "[REDACTED]"))
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .finish()
    }
}

/// Fresh data key → token → packed envelope. The plaintext key is dropped
/// (and zeroized) before this returns.
pub(crate) fn seal_envelope(
    backend: &dyn KeyManagementBackend,
    master_key_id: &MasterKeyId,
    plaintext: &[u8],
) -> Result<EncryptedRecord> {
    let data_key = backend.generate_data_key(master_key_id)?;
    let token = encrypt_to_token(plaintext, data_key.plaintext())?;
    let wrapped = data_key.into_wrapped().to_base64();

    Ok(EncryptedRecord::new(pack(&token, &wrapped), Some(wrapped)))
}

pub(crate) fn open_envelope(
    backend: &dyn KeyManagementBackend,
    token: &str,
    wrapped: &WrappedKey,
) -> Result<Vec<u8>> {
    let data_key = backend.unwrap_data_key(wrapped)?;
    decrypt_token(token, data_key.expose_secret())
}

fn utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|err| {
        drop(Zeroizing::new(err.into_bytes()));
        CoreError::MalformedEnvelope("decrypted field is not valid UTF-8".into())
    })
}
