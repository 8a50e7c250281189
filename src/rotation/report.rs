// src/rotation/report.rs
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::enums::RotationMode;

use super::job::RotationOptions;

/// Counters for one scan → re-encrypt → commit cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub loop_index: u32,
    pub records_examined: u64,
    /// Records decrypted and re-encrypted successfully
    pub records_rewrapped: u64,
    /// Rows actually written (always 0 in dry-run)
    pub records_changed: u64,
    pub records_failed: u64,
    /// Not envelope-encrypted, or already under the target master key
    pub records_skipped: u64,
}

/// Summary of one rotation invocation
#[derive(Debug, Clone, Serialize)]
pub struct RotationReport {
    pub target_master_key_id: String,
    pub mode: RotationMode,
    pub batch_size: usize,
    pub records_examined: u64,
    pub records_rewrapped: u64,
    pub records_changed: u64,
    pub records_failed: u64,
    pub records_skipped: u64,
    pub cancelled: bool,
    pub batches: Vec<BatchReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RotationReport {
    pub(crate) fn start(options: &RotationOptions) -> Self {
        Self {
            target_master_key_id: options.target_master_key_id.to_string(),
            mode: options.mode,
            batch_size: options.batch_size,
            records_examined: 0,
            records_rewrapped: 0,
            records_changed: 0,
            records_failed: 0,
            records_skipped: 0,
            cancelled: false,
            batches: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub(crate) fn push(&mut self, batch: BatchReport) {
        self.records_examined += batch.records_examined;
        self.records_rewrapped += batch.records_rewrapped;
        self.records_changed += batch.records_changed;
        self.records_failed += batch.records_failed;
        self.records_skipped += batch.records_skipped;
        self.batches.push(batch);
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}
