// src/enums.rs
//! Public enum types used throughout the crate
//!
//! Central location for all #[derive(...)] enums that represent
//! user-visible choices: storage schemes, rotation modes, KMS backends.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a stored field is protected, as inferred from its shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    Plaintext,
    LocalStatic,
    KmsEnvelope,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Plaintext => "plaintext",
            Scheme::LocalStatic => "local_static",
            Scheme::KmsEnvelope => "kms_envelope",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a rotation run writes its results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RotationMode {
    #[default]
    DryRun,
    Commit,
}

impl fmt::Display for RotationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RotationMode::DryRun => "dry-run",
            RotationMode::Commit => "commit",
        })
    }
}

/// Which key-management backend the config asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum KmsBackendKind {
    /// No KMS: envelope mode falls back to `LocalFallback` when allowed
    #[default]
    None,
    /// In-process `LocalKms` with configured master keys
    Local,
    /// AWS KMS (`aws-kms` feature)
    Aws,
    // Future:
    // Vault,
}

impl KmsBackendKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Some(KmsBackendKind::None),
            "local" => Some(KmsBackendKind::Local),
            "aws" => Some(KmsBackendKind::Aws),
            _ => None,
        }
    }
}
