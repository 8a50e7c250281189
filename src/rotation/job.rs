// src/rotation/job.rs
//! Batch re-wrap of persisted envelope records under a fresh data key
//!
//! ```text
//! Idle → Scanning → Decrypting → ReEncrypting → Committing → (Scanning | Done)
//! ```
//!
//! Each record is decrypted through its own stored scheme, re-encrypted
//! with a new data key under the target master key, and staged. A batch
//! commits in one transaction. Per-record failures are logged and skipped;
//! backend or storage failures abort the run. Cancellation is honored only
//! between batches, so a run never stops halfway through a commit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::consts::DEFAULT_BATCH_SIZE;
use crate::db::record_store::{RecordStore, StagedUpdate, StoredRow};
use crate::encryptor::{open_envelope, seal_envelope};
use crate::enums::RotationMode;
use crate::error::{CoreError, Result};
use crate::kms::{KeyManagementBackend, MasterKeyId, WrappedKey};
use crate::record::{EncryptedRecord, StoredForm};

use super::report::{BatchReport, RotationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationState {
    Idle,
    Scanning,
    Decrypting,
    ReEncrypting,
    Committing,
    Done,
}

#[derive(Debug, Clone)]
pub struct RotationOptions {
    pub target_master_key_id: MasterKeyId,
    pub batch_size: usize,
    pub mode: RotationMode,
    /// Second, explicit confirmation required before `Commit` writes anything
    pub confirmed: bool,
    /// 0 = run until no candidates remain
    pub max_loops: u32,
    /// Also re-wrap records already under the target master key
    pub include_current: bool,
}

impl RotationOptions {
    /// Dry-run defaults
    pub fn new(target_master_key_id: MasterKeyId) -> Self {
        Self {
            target_master_key_id,
            batch_size: DEFAULT_BATCH_SIZE,
            mode: RotationMode::DryRun,
            confirmed: false,
            max_loops: 0,
            include_current: false,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_commit(mut self, confirmed: bool) -> Self {
        self.mode = RotationMode::Commit;
        self.confirmed = confirmed;
        self
    }

    pub fn with_max_loops(mut self, max_loops: u32) -> Self {
        self.max_loops = max_loops;
        self
    }

    pub fn with_include_current(mut self, include_current: bool) -> Self {
        self.include_current = include_current;
        self
    }
}

pub struct RotationJob<'s, S: RecordStore> {
    store: &'s mut S,
    backend: Arc<dyn KeyManagementBackend>,
    options: RotationOptions,
    state: RotationState,
    cancel: Arc<AtomicBool>,
}

impl<'s, S: RecordStore> RotationJob<'s, S> {
    pub fn new(
        store: &'s mut S,
        backend: Arc<dyn KeyManagementBackend>,
        options: RotationOptions,
    ) -> Self {
        Self {
            store,
            backend,
            options,
            state: RotationState::Idle,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> RotationState {
        self.state
    }

    /// Set to `true` to stop after the batch in flight
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn run(&mut self) -> Result<RotationReport> {
        self.validate()?;
        self.preflight()?;

        let mut report = RotationReport::start(&self.options);
        let mut cursor: Option<i64> = None;
        let mut loops: u32 = 0;

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                info!(loops, "rotation cancelled between batches");
                report.cancelled = true;
                break;
            }
            if self.options.max_loops != 0 && loops >= self.options.max_loops {
                info!(loops, "rotation loop cap reached");
                break;
            }
            loops += 1;

            self.state = RotationState::Scanning;
            let rows = self
                .store
                .fetch_candidates(cursor, self.options.batch_size)?;
            if rows.is_empty() {
                break;
            }
            cursor = rows.last().map(|row| row.id);

            let batch = self.process_batch(loops, rows)?;
            info!(
                loop_index = batch.loop_index,
                examined = batch.records_examined,
                rewrapped = batch.records_rewrapped,
                changed = batch.records_changed,
                failed = batch.records_failed,
                skipped = batch.records_skipped,
                mode = %self.options.mode,
                "rotation batch finished"
            );
            report.push(batch);
        }

        self.state = RotationState::Done;
        report.finish();

        match self.options.mode {
            RotationMode::Commit => info!(
                total_changed = report.records_changed,
                failed = report.records_failed,
                "rotation applied"
            ),
            RotationMode::DryRun => info!(
                would_change = report.records_rewrapped,
                failed = report.records_failed,
                "dry-run complete; nothing was written"
            ),
        }
        Ok(report)
    }

    fn validate(&self) -> Result<()> {
        if self.options.batch_size == 0 {
            return Err(CoreError::Configuration("batch size must be at least 1".into()));
        }
        if self.options.mode == RotationMode::Commit && !self.options.confirmed {
            return Err(CoreError::Configuration(
                "refusing to commit a rotation without explicit confirmation".into(),
            ));
        }
        if self.backend.is_development_only() {
            warn!(
                backend = self.backend.name(),
                "rotating onto a development-only KMS stand-in; new wrapped keys are unprotected"
            );
        }
        Ok(())
    }

    /// Backend-wide problems are fatal here, before any batch is touched
    fn preflight(&self) -> Result<()> {
        let pending = self.store.count_candidates()?;
        let target = &self.options.target_master_key_id;

        let sample = self
            .backend
            .generate_data_key(target)
            .inspect_err(|err| error!(%target, %err, "preflight: cannot generate data keys"))?;
        let unwrapped = self
            .backend
            .unwrap_data_key(sample.wrapped())
            .inspect_err(|err| error!(%target, %err, "preflight: cannot unwrap data keys"))?;
        if unwrapped.expose_secret() != sample.plaintext() {
            return Err(CoreError::KeyUnavailable(
                "preflight: backend unwrapped a different key than it generated".into(),
            ));
        }

        info!(
            pending,
            %target,
            backend = self.backend.name(),
            mode = %self.options.mode,
            batch_size = self.options.batch_size,
            "rotation preflight passed"
        );
        Ok(())
    }

    fn process_batch(&mut self, loop_index: u32, rows: Vec<StoredRow>) -> Result<BatchReport> {
        let mut batch = BatchReport {
            loop_index,
            records_examined: rows.len() as u64,
            ..BatchReport::default()
        };
        let mut staged = Vec::with_capacity(rows.len());

        for row in rows {
            match self.rotate_record(&row.record) {
                Ok(Some(replacement)) => staged.push(StagedUpdate {
                    id: row.id,
                    previous: row.record,
                    replacement,
                }),
                Ok(None) => batch.records_skipped += 1,
                Err(err) => {
                    batch.records_failed += 1;
                    warn!(
                        record_id = row.id,
                        error_kind = %err.kind(),
                        "skipping record that could not be rotated"
                    );
                }
            }
        }
        batch.records_rewrapped = staged.len() as u64;

        match self.options.mode {
            RotationMode::DryRun => {
                debug!(staged = staged.len(), "dry-run: discarding staged updates");
            }
            RotationMode::Commit => {
                self.state = RotationState::Committing;
                batch.records_changed = self.store.commit_batch(&staged)? as u64;
            }
        }

        Ok(batch)
    }

    /// `Ok(None)` when the record is not eligible for rotation
    fn rotate_record(&mut self, record: &EncryptedRecord) -> Result<Option<EncryptedRecord>> {
        self.state = RotationState::Decrypting;

        // Static and plaintext rows are not this job's concern; the static
        // key flag is irrelevant because envelope shape wins.
        let (token, wrapped) = match record.resolve(false)? {
            StoredForm::Envelope { token, wrapped_key } => {
                (token, WrappedKey::from_base64(&wrapped_key)?)
            }
            StoredForm::LocalStatic(_) | StoredForm::Plaintext(_) => return Ok(None),
        };

        let target = &self.options.target_master_key_id;
        if !self.options.include_current
            && self.backend.wrapped_by(&wrapped).as_ref() == Some(target)
        {
            return Ok(None);
        }

        let plaintext = Zeroizing::new(open_envelope(self.backend.as_ref(), &token, &wrapped)?);

        self.state = RotationState::ReEncrypting;
        let replacement = seal_envelope(self.backend.as_ref(), target, &plaintext)?;
        debug!(
            from = %wrapped.fingerprint(),
            "re-wrapped record under a fresh data key"
        );
        Ok(Some(replacement))
    }
}
