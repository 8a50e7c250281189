// src/config/env.rs
//! Environment overrides
//!
//! | variable                                   | field                          |
//! |--------------------------------------------|--------------------------------|
//! | `MASTER_KEY_ID` / `KMS_KEY_ID`             | `keys.master_key_id`           |
//! | `STATIC_SYMMETRIC_KEY` / `DATA_ENCRYPTION_KEY` | `keys.static_symmetric_key` |
//! | `EFV_KMS_BACKEND`                          | `kms.backend`                  |
//! | `EFV_KMS_LOCAL_KEYS` (`id=key,id2=key2`)   | `kms.local_master_keys`        |
//! | `EFV_KMS_REGION`                           | `kms.aws_region`               |
//! | `EFV_KMS_ENDPOINT`                         | `kms.aws_endpoint`             |
//! | `EFV_RECORDS_DB`                           | `paths.records_db`             |
//! | `EFV_ALLOW_PLAINTEXT`                      | `features.allow_plaintext_storage` |
//! | `EFV_ALLOW_WEAK_FALLBACK`                  | `features.allow_weak_key_fallback` |
//!
//! The primary name wins over its legacy alias. Empty values unset optional
//! keys.

use std::collections::HashMap;

use crate::config::app::Config;
use crate::enums::KmsBackendKind;
use crate::error::{CoreError, Result};

/// Apply overrides from `vars` (normally `std::env::vars()`)
pub fn apply_env_overrides<I>(conf: &mut Config, vars: I) -> Result<()>
where
    I: IntoIterator<Item = (String, String)>,
{
    let vars: HashMap<String, String> = vars.into_iter().collect();
    let get = |primary: &str, alias: Option<&str>| {
        vars.get(primary)
            .or_else(|| alias.and_then(|a| vars.get(a)))
            .map(|v| v.trim().to_owned())
    };

    if let Some(id) = get("MASTER_KEY_ID", Some("KMS_KEY_ID")) {
        conf.keys.master_key_id = Some(id).filter(|v| !v.is_empty());
    }
    if let Some(key) = get("STATIC_SYMMETRIC_KEY", Some("DATA_ENCRYPTION_KEY")) {
        conf.keys.static_symmetric_key = Some(key).filter(|v| !v.is_empty());
    }
    if let Some(backend) = get("EFV_KMS_BACKEND", None) {
        conf.kms.backend = KmsBackendKind::parse(&backend).ok_or_else(|| {
            CoreError::Configuration(format!("EFV_KMS_BACKEND: unknown backend {backend:?}"))
        })?;
    }
    if let Some(keys) = get("EFV_KMS_LOCAL_KEYS", None) {
        conf.kms.local_master_keys.clear();
        for pair in keys.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (id, key) = pair.split_once('=').ok_or_else(|| {
                CoreError::Configuration("EFV_KMS_LOCAL_KEYS entries must look like id=key".into())
            })?;
            conf.kms
                .local_master_keys
                .insert(id.trim().to_owned(), key.trim().to_owned());
        }
    }
    if let Some(region) = get("EFV_KMS_REGION", None) {
        conf.kms.aws_region = Some(region).filter(|v| !v.is_empty());
    }
    if let Some(endpoint) = get("EFV_KMS_ENDPOINT", None) {
        conf.kms.aws_endpoint = Some(endpoint).filter(|v| !v.is_empty());
    }
    if let Some(path) = get("EFV_RECORDS_DB", None).filter(|v| !v.is_empty()) {
        conf.paths.records_db = path;
    }
    if let Some(flag) = get("EFV_ALLOW_PLAINTEXT", None) {
        conf.features.allow_plaintext_storage = parse_bool("EFV_ALLOW_PLAINTEXT", &flag)?;
    }
    if let Some(flag) = get("EFV_ALLOW_WEAK_FALLBACK", None) {
        conf.features.allow_weak_key_fallback = parse_bool("EFV_ALLOW_WEAK_FALLBACK", &flag)?;
    }

    Ok(())
}

pub fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CoreError::Configuration(format!(
            "{name}: expected a boolean, got {other:?}"
        ))),
    }
}
