// src/record.rs
//! The two persisted columns of an encrypted field, and scheme inference
//!
//! The scheme is read from the stored shape, never from the current write
//! configuration, because settings may have changed since the row was
//! written.

use serde::{Deserialize, Serialize};

use crate::crypto::cipher::is_token;
use crate::crypto::envelope::{unpack, Unpacked};
use crate::enums::Scheme;
use crate::error::{CoreError, Result};
use crate::kms::WrappedKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    /// Envelope container, bare token, or plaintext
    pub ciphertext: String,
    /// Base64 wrapped data key; `None` outside envelope mode
    pub wrapped_key: Option<String>,
}

/// A record resolved to the inputs of its scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StoredForm<'a> {
    Envelope { token: String, wrapped_key: String },
    LocalStatic(&'a str),
    Plaintext(&'a str),
}

impl EncryptedRecord {
    pub fn new(ciphertext: impl Into<String>, wrapped_key: Option<String>) -> Self {
        Self {
            ciphertext: ciphertext.into(),
            wrapped_key,
        }
    }

    /// Wrapped key column, treating an empty string as absent
    pub fn wrapped_key(&self) -> Option<&str> {
        self.wrapped_key.as_deref().filter(|w| !w.trim().is_empty())
    }

    /// Infer how this record was written.
    ///
    /// `static_key_configured` only matters for rows with no envelope
    /// shape: those are LocalStatic when a static key exists at read time,
    /// Plaintext otherwise.
    pub fn scheme(&self, static_key_configured: bool) -> Result<Scheme> {
        Ok(match self.resolve(static_key_configured)? {
            StoredForm::Envelope { .. } => Scheme::KmsEnvelope,
            StoredForm::LocalStatic(_) => Scheme::LocalStatic,
            StoredForm::Plaintext(_) => Scheme::Plaintext,
        })
    }

    pub(crate) fn resolve(&self, static_key_configured: bool) -> Result<StoredForm<'_>> {
        let bare = || {
            if static_key_configured {
                StoredForm::LocalStatic(&self.ciphertext)
            } else {
                StoredForm::Plaintext(&self.ciphertext)
            }
        };

        let Some(column) = self.wrapped_key() else {
            // Without a wrapped-key column only a well-formed sealed container
            // counts as an envelope; any other text was stored bare.
            return Ok(match unpack(&self.ciphertext) {
                Ok(Unpacked::Envelope {
                    ciphertext,
                    wrapped_key,
                }) if is_sealed(&ciphertext, &wrapped_key) => StoredForm::Envelope {
                    token: ciphertext,
                    wrapped_key,
                },
                _ => bare(),
            });
        };

        match unpack(&self.ciphertext)? {
            Unpacked::Envelope {
                ciphertext,
                wrapped_key,
            } => {
                if column.trim() != wrapped_key {
                    return Err(CoreError::MalformedEnvelope(
                        "wrapped key column does not match the envelope".into(),
                    ));
                }
                Ok(StoredForm::Envelope {
                    token: ciphertext,
                    wrapped_key,
                })
            }
            // Split layout: bare token in one column, wrapped key in the other
            Unpacked::NotEnvelope => Ok(StoredForm::Envelope {
                token: self.ciphertext.clone(),
                wrapped_key: column.to_owned(),
            }),
        }
    }
}

fn is_sealed(token: &str, wrapped_key: &str) -> bool {
    is_token(token)
        && WrappedKey::from_base64(wrapped_key).is_ok_and(|w| !w.as_bytes().is_empty())
}
