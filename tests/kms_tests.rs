// tests/kms_tests.rs
mod common;
mod support;

use encrypted_field_vault::aliases::MasterKey32;
use encrypted_field_vault::kms::{KeyManagementBackend, LocalFallback, LocalKms, WrappedKey};
use encrypted_field_vault::CoreError;

use support::{master_id, NEW_MASTER, OLD_MASTER};

#[test]
fn test_fallback_wrapped_key_is_the_raw_key() {
    common::setup();
    let fallback = LocalFallback::new();

    let data_key = fallback.generate_data_key(&master_id(OLD_MASTER)).unwrap();
    assert_eq!(data_key.wrapped().as_bytes(), data_key.plaintext());

    let unwrapped = fallback.unwrap_data_key(data_key.wrapped()).unwrap();
    assert_eq!(unwrapped.expose_secret(), data_key.plaintext());
}

#[test]
fn test_fallback_is_flagged_development_only() {
    let fallback = LocalFallback::new();
    assert!(fallback.is_development_only());
    assert!(fallback.wrapped_by(&WrappedKey::from_bytes(vec![0; 32])).is_none());
}

#[test]
fn test_fallback_rejects_wrong_length_blob() {
    let fallback = LocalFallback::new();
    let result = fallback.unwrap_data_key(&WrappedKey::from_bytes(vec![1, 2, 3]));
    assert!(matches!(result, Err(CoreError::KeyUnavailable(_))));
}

#[test]
fn test_local_kms_roundtrip_hides_data_key() {
    common::setup();
    let kms = support::local_kms();

    let data_key = kms.generate_data_key(&master_id(OLD_MASTER)).unwrap();
    assert!(!kms.is_development_only());
    assert_ne!(&data_key.wrapped().as_bytes()[..], &data_key.plaintext()[..]);
    assert!(data_key.wrapped().as_bytes().len() > 32);

    let unwrapped = kms.unwrap_data_key(data_key.wrapped()).unwrap();
    assert_eq!(unwrapped.expose_secret(), data_key.plaintext());
}

#[test]
fn test_local_kms_fresh_key_per_call() {
    let kms = support::local_kms();
    let a = kms.generate_data_key(&master_id(OLD_MASTER)).unwrap();
    let b = kms.generate_data_key(&master_id(OLD_MASTER)).unwrap();

    assert_ne!(a.plaintext(), b.plaintext());
    assert_ne!(a.wrapped(), b.wrapped());
}

#[test]
fn test_local_kms_reports_wrapping_master() {
    let kms = support::local_kms();
    let old = kms.generate_data_key(&master_id(OLD_MASTER)).unwrap();
    let new = kms.generate_data_key(&master_id(NEW_MASTER)).unwrap();

    assert_eq!(kms.wrapped_by(old.wrapped()), Some(master_id(OLD_MASTER)));
    assert_eq!(kms.wrapped_by(new.wrapped()), Some(master_id(NEW_MASTER)));
    assert_eq!(kms.wrapped_by(&WrappedKey::from_bytes(vec![9; 4])), None);
}

#[test]
fn test_local_kms_unknown_master_is_unavailable() {
    let kms = support::local_kms();
    let result = kms.generate_data_key(&master_id("alias/never-created"));
    assert!(matches!(result, Err(CoreError::KeyUnavailable(_))));
}

#[test]
fn test_local_kms_cannot_unwrap_foreign_blob() {
    let kms = support::local_kms();
    let data_key = kms.generate_data_key(&master_id(OLD_MASTER)).unwrap();

    let mut other = LocalKms::new();
    other
        .insert_master_key(master_id(NEW_MASTER), MasterKey32::new([0x22; 32]))
        .unwrap();

    let result = other.unwrap_data_key(data_key.wrapped());
    assert!(matches!(result, Err(CoreError::KeyUnavailable(_))));
}

#[test]
fn test_local_kms_tampered_blob_fails_authentication() {
    let kms = support::local_kms();
    let data_key = kms.generate_data_key(&master_id(OLD_MASTER)).unwrap();

    let mut bytes = data_key.wrapped().as_bytes().to_vec();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;

    let result = kms.unwrap_data_key(&WrappedKey::from_bytes(bytes));
    assert!(matches!(result, Err(CoreError::Authentication)));
}

#[test]
fn test_local_kms_relabelled_blob_fails_authentication() {
    // Same key under both ids: only the bound id tells the blobs apart
    let mut kms = LocalKms::new();
    kms.insert_master_key(master_id("a/one"), MasterKey32::new([5; 32]))
        .unwrap();
    kms.insert_master_key(master_id("a/two"), MasterKey32::new([5; 32]))
        .unwrap();

    let data_key = kms.generate_data_key(&master_id("a/one")).unwrap();
    let mut bytes = data_key.wrapped().as_bytes().to_vec();
    // "a/one" → "a/two": id starts after version and length bytes
    bytes[2..7].copy_from_slice(b"a/two");

    let result = kms.unwrap_data_key(&WrappedKey::from_bytes(bytes));
    assert!(matches!(result, Err(CoreError::Authentication)));
}

#[test]
fn test_local_kms_truncated_blob_is_unavailable() {
    let kms = support::local_kms();
    let data_key = kms.generate_data_key(&master_id(OLD_MASTER)).unwrap();
    let truncated = data_key.wrapped().as_bytes()[..24].to_vec();

    let result = kms.unwrap_data_key(&WrappedKey::from_bytes(truncated));
    assert!(matches!(result, Err(CoreError::KeyUnavailable(_))));
}

#[test]
fn test_local_kms_from_hex_keys() {
    let hex_key = "11".repeat(32);
    let kms = LocalKms::from_hex_keys([(OLD_MASTER, hex_key.as_str())]).unwrap();

    assert!(kms.contains(&master_id(OLD_MASTER)));
    assert!(!kms.contains(&master_id(NEW_MASTER)));

    // Same material as support::local_kms(), so blobs are interchangeable
    let data_key = kms.generate_data_key(&master_id(OLD_MASTER)).unwrap();
    let unwrapped = support::local_kms()
        .unwrap_data_key(data_key.wrapped())
        .unwrap();
    assert_eq!(unwrapped.expose_secret(), data_key.plaintext());
}

#[test]
fn test_local_kms_rejects_bad_key_material() {
    let result = LocalKms::from_hex_keys([(OLD_MASTER, "not-a-key")]);
    assert!(matches!(result, Err(CoreError::Configuration(_))));
}

#[test]
fn test_master_key_id_rejects_blank() {
    assert!(matches!(
        encrypted_field_vault::MasterKeyId::new("   "),
        Err(CoreError::Configuration(_))
    ));
    assert_eq!(master_id("  alias/x ").as_str(), "alias/x");
}

#[test]
fn test_debug_output_never_shows_key_bytes() {
    let kms = support::local_kms();
    let data_key = kms.generate_data_key(&master_id(OLD_MASTER)).unwrap();

    let rendered = format!("{data_key:?}");
    assert!(rendered.contains("[REDACTED]"));
    assert!(!rendered.contains(&hex::encode(data_key.plaintext())));
}

#[cfg(not(feature = "aws-kms"))]
#[test]
fn test_aws_backend_without_feature_is_a_config_error() {
    let mut config = encrypted_field_vault::Config::default();
    config.kms.backend = encrypted_field_vault::KmsBackendKind::Aws;
    config.kms.aws_region = Some("eu-west-1".into());

    let result = encrypted_field_vault::kms::backend_from_config(&config);
    assert!(matches!(result, Err(CoreError::Configuration(_))));
}

#[cfg(feature = "aws-kms")]
mod aws {
    use super::*;
    use aws_config::retry::RetryConfig;
    use aws_config::{BehaviorVersion, Region};
    use aws_sdk_kms::config::Credentials;
    use encrypted_field_vault::kms::AwsKms;

    /// Static credentials pointed at a closed local port
    fn unreachable_aws_kms() -> AwsKms {
        let loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new("eu-west-1"))
            .endpoint_url("http://127.0.0.1:1")
            .credentials_provider(Credentials::new("AKIDTEST", "secret", None, None, "tests"))
            .retry_config(RetryConfig::disabled());
        let sdk_config = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(loader.load());
        AwsKms::from_sdk_config(&sdk_config).unwrap()
    }

    #[test]
    fn test_unreachable_aws_kms_is_key_unavailable() {
        common::setup();
        let kms = unreachable_aws_kms();
        assert_eq!(kms.name(), "aws-kms");
        assert!(!kms.is_development_only());

        let generated = kms.generate_data_key(&master_id(NEW_MASTER));
        assert!(matches!(generated, Err(CoreError::KeyUnavailable(_))));

        let unwrapped = kms.unwrap_data_key(&WrappedKey::from_bytes(vec![7; 64]));
        assert!(matches!(unwrapped, Err(CoreError::KeyUnavailable(_))));
    }

    #[test]
    fn test_aws_blobs_do_not_reveal_master_key() {
        let kms = unreachable_aws_kms();
        assert!(kms.wrapped_by(&WrappedKey::from_bytes(vec![7; 64])).is_none());
    }
}
