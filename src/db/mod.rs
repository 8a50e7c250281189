// src/db/mod.rs
//! Records database: connection setup and the store used by key rotation
pub mod record_store;
pub mod records_db_conn;

pub use record_store::{RecordStore, SqliteRecordStore, StagedUpdate, StoreLayout, StoredRow};
pub use records_db_conn::{ensure_schema, open_records_db};
