// tests/support.rs
//! Test fixtures — key material, backends and a populated record store

use std::sync::Arc;

use encrypted_field_vault::aliases::{DataKey32, MasterKey32, StaticKey32};
use encrypted_field_vault::db::{SqliteRecordStore, StoreLayout};
use encrypted_field_vault::kms::{DataKey, KeyManagementBackend, LocalKms, MasterKeyId, WrappedKey};
use encrypted_field_vault::{CoreError, CoreResult, EncryptedRecord, FieldEncryptor};

#[allow(dead_code)]
pub const OLD_MASTER: &str = "alias/journal-2024";
#[allow(dead_code)]
pub const NEW_MASTER: &str = "alias/journal-2025";

#[allow(dead_code)]
pub fn master_id(id: &str) -> MasterKeyId {
    MasterKeyId::new(id).expect("valid master key id")
}

#[allow(dead_code)]
pub fn static_key() -> StaticKey32 {
    StaticKey32::new([0x42; 32])
}

/// LocalKms holding both the old and the new master key
#[allow(dead_code)]
pub fn local_kms() -> Arc<LocalKms> {
    let mut kms = LocalKms::new();
    kms.insert_master_key(master_id(OLD_MASTER), MasterKey32::new([0x11; 32]))
        .expect("insert old master");
    kms.insert_master_key(master_id(NEW_MASTER), MasterKey32::new([0x22; 32]))
        .expect("insert new master");
    Arc::new(kms)
}

/// Envelope encryptor writing under `master` through `backend`
#[allow(dead_code)]
pub fn envelope_encryptor(backend: Arc<dyn KeyManagementBackend>, master: &str) -> FieldEncryptor {
    FieldEncryptor::builder()
        .backend(backend)
        .master_key_id(master_id(master))
        .build()
        .expect("envelope encryptor")
}

/// In-memory store pre-filled with `plaintexts`, encrypted by `encryptor`
#[allow(dead_code)]
pub fn store_with(
    encryptor: &FieldEncryptor,
    plaintexts: &[&str],
) -> (SqliteRecordStore, Vec<i64>) {
    let store = SqliteRecordStore::open_in_memory(StoreLayout::default()).expect("open store");
    let ids = plaintexts
        .iter()
        .map(|p| {
            let record = encryptor.encrypt_text(p).expect("encrypt fixture");
            store.insert(&record).expect("insert fixture")
        })
        .collect();
    (store, ids)
}

#[allow(dead_code)]
pub fn records(store: &SqliteRecordStore, ids: &[i64]) -> Vec<EncryptedRecord> {
    ids.iter()
        .map(|id| store.get(*id).expect("get").expect("row exists"))
        .collect()
}

#[allow(dead_code)]
pub fn wrapped_keys(store: &SqliteRecordStore, ids: &[i64]) -> Vec<Option<String>> {
    records(store, ids)
        .into_iter()
        .map(|record| record.wrapped_key)
        .collect()
}

/// A KMS that is down: every call fails with `KeyUnavailable`
#[allow(dead_code)]
pub struct UnreachableKms;

impl KeyManagementBackend for UnreachableKms {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    fn generate_data_key(&self, _master_key_id: &MasterKeyId) -> CoreResult<DataKey> {
        Err(CoreError::KeyUnavailable("connection refused".into()))
    }

    fn unwrap_data_key(&self, _wrapped: &WrappedKey) -> CoreResult<DataKey32> {
        Err(CoreError::KeyUnavailable("connection refused".into()))
    }
}
