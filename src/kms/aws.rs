// src/kms/aws.rs
//! AWS KMS backend (`aws-kms` feature)
//!
//! Data keys come from `GenerateDataKey` (`DataKeySpec::Aes256`, 32 bytes) and the
//! returned `CiphertextBlob` is stored as the wrapped key verbatim. Unwrap
//! is a plain `Decrypt`: symmetric KMS blobs carry their key id, so no
//! hint is needed.
//!
//! The SDK is async while [`KeyManagementBackend`] is not. `AwsKms` owns a
//! current-thread tokio runtime and blocks on it for each call, so it must
//! not be used from inside another tokio runtime. The SDK's retry layer is
//! disabled: every call is one attempt and any failure is `KeyUnavailable`.

use std::fmt;

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_kms::error::DisplayErrorContext;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::DataKeySpec;
use aws_sdk_kms::Client;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, error};
use zeroize::Zeroize;

use crate::aliases::DataKey32;
use crate::consts::KEY_LEN;
use crate::error::{CoreError, Result};

use super::{DataKey, KeyManagementBackend, MasterKeyId, WrappedKey};

pub struct AwsKms {
    client: Client,
    runtime: Runtime,
}

impl AwsKms {
    /// Load credentials from the default provider chain.
    ///
    /// `region` and `endpoint` override what the environment provides;
    /// `endpoint` is meant for KMS-compatible local services.
    pub fn connect(region: Option<&str>, endpoint: Option<&str>) -> Result<Self> {
        let runtime = build_runtime()?;

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).retry_config(RetryConfig::disabled());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_owned()));
        }
        if let Some(endpoint) = endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = runtime.block_on(loader.load());

        if sdk_config.region().is_none() {
            return Err(CoreError::Configuration(
                "AWS KMS backend needs a region (kms.aws_region, EFV_KMS_REGION or AWS_REGION)"
                    .into(),
            ));
        }
        debug!(region = ?sdk_config.region(), endpoint, "AWS KMS client ready");

        Ok(Self {
            client: Client::new(&sdk_config),
            runtime,
        })
    }

    /// Use an already-loaded SDK config as is
    pub fn from_sdk_config(sdk_config: &SdkConfig) -> Result<Self> {
        Ok(Self {
            client: Client::new(sdk_config),
            runtime: build_runtime()?,
        })
    }
}

fn build_runtime() -> Result<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| CoreError::Configuration(format!("cannot start AWS KMS runtime: {err}")))
}

fn data_key_from_blob(plaintext: Option<&Blob>) -> Result<DataKey32> {
    let plaintext = plaintext
        .ok_or_else(|| CoreError::KeyUnavailable("AWS KMS returned no plaintext key".into()))?;
    let mut bytes: [u8; KEY_LEN] = plaintext.as_ref().try_into().map_err(|_| {
        CoreError::KeyUnavailable(format!(
            "AWS KMS returned a {}-byte key, expected {KEY_LEN}",
            plaintext.as_ref().len()
        ))
    })?;
    let key = DataKey32::new(bytes);
    bytes.zeroize();
    Ok(key)
}

impl KeyManagementBackend for AwsKms {
    fn name(&self) -> &'static str {
        "aws-kms"
    }

    fn generate_data_key(&self, master_key_id: &MasterKeyId) -> Result<DataKey> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .generate_data_key()
                    .key_id(master_key_id.as_str())
                    .key_spec(DataKeySpec::Aes256)
                    .send(),
            )
            .map_err(|err| {
                error!(%master_key_id, "AWS KMS GenerateDataKey failed");
                CoreError::KeyUnavailable(format!(
                    "AWS KMS GenerateDataKey under {master_key_id}: {}",
                    DisplayErrorContext(&err)
                ))
            })?;

        let plaintext = data_key_from_blob(output.plaintext())?;
        let wrapped = output.ciphertext_blob().ok_or_else(|| {
            CoreError::KeyUnavailable("AWS KMS returned no ciphertext blob".into())
        })?;
        Ok(DataKey::new(
            plaintext,
            WrappedKey::from_bytes(wrapped.as_ref().to_vec()),
        ))
    }

    fn unwrap_data_key(&self, wrapped: &WrappedKey) -> Result<DataKey32> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .decrypt()
                    .ciphertext_blob(Blob::new(wrapped.as_bytes()))
                    .send(),
            )
            .map_err(|err| {
                error!(wrapped = ?wrapped, "AWS KMS Decrypt failed");
                CoreError::KeyUnavailable(format!(
                    "AWS KMS Decrypt: {}",
                    DisplayErrorContext(&err)
                ))
            })?;

        data_key_from_blob(output.plaintext())
    }
}

impl fmt::Debug for AwsKms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsKms")
            .field("region", &self.client.config().region())
            .finish_non_exhaustive()
    }
}
