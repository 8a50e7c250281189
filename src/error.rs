// src/error.rs
//! Public error type for the entire crate

use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    /// No usable key source, or a setting that cannot be honored.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The KMS could not produce or unwrap a key (unreachable, denied, bad blob).
    #[error("Key unavailable: {0}")]
    KeyUnavailable(String),

    /// AEAD tag verification failed — tampered ciphertext or wrong key.
    #[error("Authentication failed: ciphertext was modified or the key is wrong")]
    Authentication,

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Another rotation run holds the lock at {0}")]
    RunLocked(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Coarse, loggable classification of a [`CoreError`].
///
/// Never carries key material or plaintext, so it is safe to attach to
/// log lines and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    KeyUnavailable,
    Authentication,
    MalformedEnvelope,
    Storage,
    RunLocked,
    Io,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Configuration(_) | CoreError::ConfigParse(_) => ErrorKind::Configuration,
            CoreError::KeyUnavailable(_) => ErrorKind::KeyUnavailable,
            CoreError::Authentication => ErrorKind::Authentication,
            CoreError::MalformedEnvelope(_) => ErrorKind::MalformedEnvelope,
            CoreError::Storage(_) => ErrorKind::Storage,
            CoreError::RunLocked(_) => ErrorKind::RunLocked,
            CoreError::Io(_) => ErrorKind::Io,
        }
    }
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::KeyUnavailable => "key_unavailable",
            ErrorKind::Authentication => "authentication",
            ErrorKind::MalformedEnvelope => "malformed_envelope",
            ErrorKind::Storage => "storage",
            ErrorKind::RunLocked => "run_locked",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
