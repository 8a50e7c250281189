// src/rotation/mod.rs
//! Key rotation for persisted envelope-encrypted fields
//!
//! This is a core vault maintenance operation — used by the `rotate_keys`
//! binary and by anything embedding the job directly.

mod job;
mod lock;
mod report;

pub use job::{RotationJob, RotationOptions, RotationState};
pub use lock::RunLock;
pub use report::{BatchReport, RotationReport};
