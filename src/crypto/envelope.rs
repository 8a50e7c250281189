// src/crypto/envelope.rs
//! Envelope container: `{ciphertext, wrapped data key, scheme tag}` as JSON
//!
//! ```text
//! {"ct":"<field token>","ek":"<base64 wrapped key>","scheme":"kms_envelope","v":1}
//! ```
//!
//! Older rows carry only `{"ct": …, "ek": …}`; those still unpack. Any
//! other key makes the container malformed.
//! Anything that is not a JSON object with envelope keys is reported as
//! [`Unpacked::NotEnvelope`] so pre-envelope ciphertext and plaintext rows
//! keep working.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::consts::{ENVELOPE_SCHEME_TAG, ENVELOPE_VERSION};
use crate::error::{CoreError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unpacked {
    Envelope {
        ciphertext: String,
        wrapped_key: String,
    },
    NotEnvelope,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Container {
    #[serde(default)]
    v: Option<u64>,
    #[serde(default)]
    scheme: Option<String>,
    ct: String,
    ek: String,
}

/// Pack a field token and its base64 wrapped key into a container string.
///
/// Pure and deterministic: keys are emitted in sorted order, and
/// `unpack(&pack(c, k))` yields `c` and `k` back for any strings.
pub fn pack(ciphertext: &str, wrapped_key: &str) -> String {
    json!({
        "v": ENVELOPE_VERSION,
        "scheme": ENVELOPE_SCHEME_TAG,
        "ct": ciphertext,
        "ek": wrapped_key,
    })
    .to_string()
}

/// Split a stored value back into `(ciphertext, wrapped_key)`.
pub fn unpack(container: &str) -> Result<Unpacked> {
    let trimmed = container.trim();
    if !trimmed.starts_with('{') {
        return Ok(Unpacked::NotEnvelope);
    }

    let map = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => map,
        // Broken JSON that still names envelope fields was an envelope once.
        _ if mentions_envelope_keys(trimmed) => {
            return Err(CoreError::MalformedEnvelope(
                "envelope container is not valid JSON".into(),
            ))
        }
        _ => return Ok(Unpacked::NotEnvelope),
    };

    if !map.contains_key("ct") && !map.contains_key("ek") {
        return Ok(Unpacked::NotEnvelope);
    }

    let container: Container = serde_json::from_value(Value::Object(map))
        .map_err(|e| CoreError::MalformedEnvelope(e.to_string()))?;

    if let Some(v) = container.v {
        if v != ENVELOPE_VERSION {
            return Err(CoreError::MalformedEnvelope(format!(
                "unsupported envelope version {v}"
            )));
        }
    }
    if let Some(scheme) = container.scheme.as_deref() {
        if scheme != ENVELOPE_SCHEME_TAG {
            return Err(CoreError::MalformedEnvelope(format!(
                "unsupported envelope scheme {scheme:?}"
            )));
        }
    }
    Ok(Unpacked::Envelope {
        ciphertext: container.ct,
        wrapped_key: container.ek,
    })
}

fn mentions_envelope_keys(text: &str) -> bool {
    text.contains("\"ct\"") || text.contains("\"ek\"")
}
