// tests/rotation_tests.rs
mod common;
mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use encrypted_field_vault::db::RecordStore;
use encrypted_field_vault::kms::KeyManagementBackend;
use encrypted_field_vault::rotation::RotationState;
use encrypted_field_vault::{
    CoreError, EncryptedRecord, FieldEncryptor, LocalFallback, RotationJob, RotationMode,
    RotationOptions, RunLock, WrappedKey,
};

use support::{master_id, NEW_MASTER, OLD_MASTER};

fn plaintexts(encryptor: &FieldEncryptor, records: &[EncryptedRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| encryptor.decrypt_text(r).unwrap())
        .collect()
}

#[test]
fn test_dry_run_examines_everything_and_writes_nothing() {
    common::setup();
    let kms = support::local_kms();
    let encryptor = support::envelope_encryptor(kms.clone(), OLD_MASTER);
    let (mut store, ids) = support::store_with(&encryptor, &["a", "b", "c"]);
    let before = support::records(&store, &ids);

    let options = RotationOptions::new(master_id(NEW_MASTER)).with_batch_size(1);
    let mut job = RotationJob::new(&mut store, kms, options);
    let report = job.run().unwrap();

    assert_eq!(job.state(), RotationState::Done);
    assert_eq!(report.mode, RotationMode::DryRun);
    assert_eq!(report.records_examined, 3);
    assert_eq!(report.records_rewrapped, 3);
    assert_eq!(report.records_changed, 0);
    assert_eq!(report.records_failed, 0);
    assert_eq!(report.batches.len(), 3);
    assert!(report.finished_at.is_some());

    assert_eq!(support::records(&store, &ids), before);
}

#[test]
fn test_commit_rewraps_every_record_and_preserves_plaintext() {
    common::setup();
    let kms = support::local_kms();
    let encryptor = support::envelope_encryptor(kms.clone(), OLD_MASTER);
    let (mut store, ids) = support::store_with(&encryptor, &["a", "b", "c"]);
    let before = support::wrapped_keys(&store, &ids);

    let options = RotationOptions::new(master_id(NEW_MASTER))
        .with_batch_size(2)
        .with_commit(true);
    let report = RotationJob::new(&mut store, kms.clone(), options)
        .run()
        .unwrap();

    assert_eq!(report.records_examined, 3);
    assert_eq!(report.records_changed, 3);
    assert_eq!(report.batches.len(), 2);

    let after = support::records(&store, &ids);
    for (old, new) in before.iter().zip(&after) {
        assert_ne!(old, &new.wrapped_key);
        let wrapped = WrappedKey::from_base64(new.wrapped_key().unwrap()).unwrap();
        assert_eq!(kms.wrapped_by(&wrapped), Some(master_id(NEW_MASTER)));
    }
    assert_eq!(plaintexts(&encryptor, &after), ["a", "b", "c"]);
}

#[test]
fn test_rotation_is_resumable_across_runs() {
    common::setup();
    let kms = support::local_kms();
    let encryptor = support::envelope_encryptor(kms.clone(), OLD_MASTER);
    let (mut store, ids) = support::store_with(&encryptor, &["one", "two", "three", "four"]);

    let first = RotationOptions::new(master_id(NEW_MASTER))
        .with_batch_size(1)
        .with_commit(true)
        .with_max_loops(2);
    let report = RotationJob::new(&mut store, kms.clone(), first).run().unwrap();
    assert_eq!(report.records_changed, 2);

    // Second run skips the two already under the new master
    let second = RotationOptions::new(master_id(NEW_MASTER))
        .with_batch_size(1)
        .with_commit(true);
    let report = RotationJob::new(&mut store, kms.clone(), second).run().unwrap();
    assert_eq!(report.records_examined, 4);
    assert_eq!(report.records_skipped, 2);
    assert_eq!(report.records_changed, 2);

    // Third run has nothing left to do
    let third = RotationOptions::new(master_id(NEW_MASTER)).with_commit(true);
    let report = RotationJob::new(&mut store, kms, third).run().unwrap();
    assert_eq!(report.records_changed, 0);
    assert_eq!(report.records_skipped, 4);

    let after = support::records(&store, &ids);
    assert_eq!(plaintexts(&encryptor, &after), ["one", "two", "three", "four"]);
}

#[test]
fn test_include_current_rewraps_records_already_on_target() {
    let kms = support::local_kms();
    let encryptor = support::envelope_encryptor(kms.clone(), NEW_MASTER);
    let (mut store, ids) = support::store_with(&encryptor, &["x", "y"]);
    let before = support::wrapped_keys(&store, &ids);

    let options = RotationOptions::new(master_id(NEW_MASTER))
        .with_commit(true)
        .with_include_current(true);
    let report = RotationJob::new(&mut store, kms, options).run().unwrap();

    assert_eq!(report.records_changed, 2);
    assert_ne!(support::wrapped_keys(&store, &ids), before);
}

#[test]
fn test_commit_without_confirmation_is_refused() {
    let kms = support::local_kms();
    let encryptor = support::envelope_encryptor(kms.clone(), OLD_MASTER);
    let (mut store, ids) = support::store_with(&encryptor, &["a"]);
    let before = support::records(&store, &ids);

    let options = RotationOptions::new(master_id(NEW_MASTER)).with_commit(false);
    let result = RotationJob::new(&mut store, kms, options).run();

    assert!(matches!(result, Err(CoreError::Configuration(_))));
    assert_eq!(support::records(&store, &ids), before);
}

#[test]
fn test_zero_batch_size_is_refused() {
    let kms = support::local_kms();
    let encryptor = support::envelope_encryptor(kms.clone(), OLD_MASTER);
    let (mut store, _) = support::store_with(&encryptor, &["a"]);

    let options = RotationOptions::new(master_id(NEW_MASTER)).with_batch_size(0);
    let result = RotationJob::new(&mut store, kms, options).run();
    assert!(matches!(result, Err(CoreError::Configuration(_))));
}

#[test]
fn test_unreachable_kms_fails_preflight_and_writes_nothing() {
    common::setup();
    let kms = support::local_kms();
    let encryptor = support::envelope_encryptor(kms, OLD_MASTER);
    let (mut store, ids) = support::store_with(&encryptor, &["a", "b"]);
    let before = support::records(&store, &ids);

    let options = RotationOptions::new(master_id(NEW_MASTER)).with_commit(true);
    let result = RotationJob::new(&mut store, Arc::new(support::UnreachableKms), options).run();

    assert!(matches!(result, Err(CoreError::KeyUnavailable(_))));
    assert_eq!(support::records(&store, &ids), before);
}

#[test]
fn test_bad_records_are_skipped_not_fatal() {
    common::setup();
    let kms = support::local_kms();
    let encryptor = support::envelope_encryptor(kms.clone(), OLD_MASTER);
    let (mut store, mut ids) = support::store_with(&encryptor, &["good one"]);

    // Envelope-shaped but wrapped under a key this KMS never held
    let foreign = support::envelope_encryptor(Arc::new(LocalFallback::new()), OLD_MASTER)
        .encrypt_text("orphan")
        .unwrap();
    ids.push(store.insert(&foreign).unwrap());
    // Wrapped-key column present but the container is cut short
    ids.push(
        store
            .insert(&EncryptedRecord::new(r#"{"ct":"abc""#, Some("a2V5".into())))
            .unwrap(),
    );
    ids.push(
        store
            .insert(&encryptor.encrypt_text("good two").unwrap())
            .unwrap(),
    );

    let options = RotationOptions::new(master_id(NEW_MASTER)).with_commit(true);
    let report = RotationJob::new(&mut store, kms, options).run().unwrap();

    assert_eq!(report.records_examined, 4);
    assert_eq!(report.records_failed, 2);
    assert_eq!(report.records_skipped, 0);
    assert_eq!(report.records_changed, 2);

    let after = support::records(&store, &ids);
    assert_eq!(after[1], foreign);
    assert_eq!(encryptor.decrypt_text(&after[0]).unwrap(), "good one");
    assert_eq!(encryptor.decrypt_text(&after[3]).unwrap(), "good two");
}

#[test]
fn test_non_envelope_rows_are_left_alone() {
    let kms = support::local_kms();
    let encryptor = support::envelope_encryptor(kms.clone(), OLD_MASTER);
    let (mut store, mut ids) = support::store_with(&encryptor, &["enveloped"]);
    ids.push(
        store
            .insert(&EncryptedRecord::new("{ just a note with braces }", None))
            .unwrap(),
    );
    ids.push(
        store
            .insert(&EncryptedRecord::new(r#"{"ct": "my notes"}"#, None))
            .unwrap(),
    );
    ids.push(store.insert(&EncryptedRecord::new("plain", None)).unwrap());
    let before = support::records(&store, &ids);

    assert_eq!(store.count_candidates().unwrap(), 3);

    let options = RotationOptions::new(master_id(NEW_MASTER)).with_commit(true);
    let report = RotationJob::new(&mut store, kms, options).run().unwrap();

    assert_eq!(report.records_examined, 3);
    assert_eq!(report.records_skipped, 2);
    assert_eq!(report.records_changed, 1);

    let after = support::records(&store, &ids);
    assert_eq!(after[1..], before[1..]);
}

#[test]
fn test_cancel_before_run_stops_at_first_batch_boundary() {
    let kms = support::local_kms();
    let encryptor = support::envelope_encryptor(kms.clone(), OLD_MASTER);
    let (mut store, ids) = support::store_with(&encryptor, &["a", "b"]);
    let before = support::records(&store, &ids);

    let options = RotationOptions::new(master_id(NEW_MASTER)).with_commit(true);
    let mut job = RotationJob::new(&mut store, kms, options);
    job.cancel_handle().store(true, Ordering::SeqCst);
    let report = job.run().unwrap();

    assert!(report.cancelled);
    assert_eq!(report.records_examined, 0);
    assert_eq!(support::records(&store, &ids), before);
}

#[test]
fn test_fallback_rows_rotate_under_fallback() {
    common::setup();
    let fallback: Arc<dyn KeyManagementBackend> = Arc::new(LocalFallback::new());
    let legacy = support::envelope_encryptor(fallback, OLD_MASTER);
    let (mut store, ids) = support::store_with(&legacy, &["dev row"]);

    // The fallback can still open its raw keys; new blobs come from the fallback too
    let report = RotationJob::new(
        &mut store,
        Arc::new(LocalFallback::new()),
        RotationOptions::new(master_id(NEW_MASTER)).with_commit(true),
    )
    .run()
    .unwrap();
    assert_eq!(report.records_changed, 1);
    assert_eq!(legacy.decrypt_text(&support::records(&store, &ids)[0]).unwrap(), "dev row");
}

#[test]
fn test_run_lock_is_exclusive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rotate.lock");

    let lock = RunLock::acquire(&path).unwrap();
    assert!(path.exists());
    assert_eq!(lock.path(), path.as_path());
    assert!(matches!(
        RunLock::acquire(&path),
        Err(CoreError::RunLocked(_))
    ));

    drop(lock);
    assert!(!path.exists());
    let again = RunLock::acquire(&path).unwrap();
    drop(again);
}

#[test]
fn test_report_serializes_to_json() {
    let kms = support::local_kms();
    let encryptor = support::envelope_encryptor(kms.clone(), OLD_MASTER);
    let (mut store, _) = support::store_with(&encryptor, &["a"]);

    let report = RotationJob::new(&mut store, kms, RotationOptions::new(master_id(NEW_MASTER)))
        .run()
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["target_master_key_id"], NEW_MASTER);
    assert_eq!(json["records_examined"], 1);
    assert_eq!(json["records_changed"], 0);
}
