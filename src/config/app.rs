// src/config/app.rs
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use super::env::apply_env_overrides;
use crate::consts::DEFAULT_CONFIG_PATH;
use crate::enums::KmsBackendKind;
use crate::error::Result;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub keys: Keys,
    pub kms: Kms,
    pub paths: Paths,
    pub store: Store,
    pub features: Features,
}

/// Key sources for the write path. Either, both or neither may be set.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct Keys {
    /// `MASTER_KEY_ID` — enables KMS envelope mode
    pub master_key_id: Option<String>,
    /// `STATIC_SYMMETRIC_KEY` — 64 hex chars or base64 of 32 bytes
    pub static_symmetric_key: Option<String>,
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct Kms {
    pub backend: KmsBackendKind,
    /// Master keys for `backend = "local"`, id → hex/base64 key
    pub local_master_keys: BTreeMap<String, String>,
    /// Region for `backend = "aws"`; unset means the SDK's own lookup
    pub aws_region: Option<String>,
    /// Endpoint override for `backend = "aws"` (KMS-compatible services)
    pub aws_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub records_db: String,
}

/// Where the encrypted field lives in the records database
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Store {
    pub table: String,
    pub id_column: String,
    pub ciphertext_column: String,
    pub wrapped_key_column: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Features {
    /// Store fields unencrypted when no key source is configured
    pub allow_plaintext_storage: bool,
    /// Use `LocalFallback` (raw keys as wrapped keys) when no KMS is configured
    pub allow_weak_key_fallback: bool,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Load config: `$EFV_CONFIG` (or `efv-config.toml`), then process env overrides.
///
/// Falls back to built-in defaults if the file is missing.
pub fn load() -> Result<Config> {
    let config_path =
        std::env::var("EFV_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut conf = load_from_path(&config_path)?;
    apply_env_overrides(&mut conf, std::env::vars())?;
    Ok(conf)
}

/// Load only the file layer, without env overrides
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if path.exists() {
        debug!(path = %path.display(), "loading config file");
        Config::from_toml_str(&std::fs::read_to_string(path)?)
    } else {
        warn!(path = %path.display(), "config file not found — using built-in defaults");
        Ok(Config::default())
    }
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys")
            .field("master_key_id", &self.master_key_id)
            .field(
                "static_symmetric_key",
                &self.static_symmetric_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl fmt::Debug for Kms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kms")
            .field("backend", &self.backend)
            .field(
                "local_master_keys",
                &self.local_master_keys.keys().collect::<Vec<_>>(),
            )
            .field("aws_region", &self.aws_region)
            .field("aws_endpoint", &self.aws_endpoint)
            .finish()
    }
}
