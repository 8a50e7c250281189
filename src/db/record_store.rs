// src/db/record_store.rs
//! Record store seen by the rotation job
//!
//! Only the id, ciphertext and wrapped-key columns of the configured table
//! are touched. Table and column names come from config, so they are
//! validated as plain SQL identifiers before being spliced into statements.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::config::Store;
use crate::db::records_db_conn::{ensure_schema, open_records_db};
use crate::error::{CoreError, Result};
use crate::record::EncryptedRecord;

/// Ciphertext values starting like this may be single-column envelopes
const CONTAINER_LIKE: &str = "{%";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    table: String,
    id_column: String,
    ciphertext_column: String,
    wrapped_key_column: String,
}

impl StoreLayout {
    pub fn new(table: &str, id: &str, ciphertext: &str, wrapped_key: &str) -> Result<Self> {
        Ok(Self {
            table: identifier(table)?,
            id_column: identifier(id)?,
            ciphertext_column: identifier(ciphertext)?,
            wrapped_key_column: identifier(wrapped_key)?,
        })
    }

    pub fn from_config(store: &Store) -> Result<Self> {
        Self::new(
            &store.table,
            &store.id_column,
            &store.ciphertext_column,
            &store.wrapped_key_column,
        )
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn ciphertext_column(&self) -> &str {
        &self.ciphertext_column
    }

    pub fn wrapped_key_column(&self) -> &str {
        &self.wrapped_key_column
    }
}

impl Default for StoreLayout {
    fn default() -> Self {
        let store = Store::default();
        Self {
            table: store.table,
            id_column: store.id_column,
            ciphertext_column: store.ciphertext_column,
            wrapped_key_column: store.wrapped_key_column,
        }
    }
}

fn identifier(name: &str) -> Result<String> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name.to_owned())
    } else {
        Err(CoreError::Configuration(format!(
            "{name:?} is not a valid SQL identifier"
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub id: i64,
    pub record: EncryptedRecord,
}

/// A re-wrapped record waiting for its batch commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedUpdate {
    pub id: i64,
    /// Values read during the scan; the write only lands if they are unchanged
    pub previous: EncryptedRecord,
    pub replacement: EncryptedRecord,
}

pub trait RecordStore {
    /// Rows that may hold envelope-encrypted data
    fn count_candidates(&self) -> Result<u64>;

    /// Up to `limit` candidate rows with id > `after_id`, ordered by id
    fn fetch_candidates(&self, after_id: Option<i64>, limit: usize) -> Result<Vec<StoredRow>>;

    /// Apply all updates in one transaction; returns how many rows changed
    fn commit_batch(&mut self, updates: &[StagedUpdate]) -> Result<usize>;
}

pub struct SqliteRecordStore {
    conn: Connection,
    layout: StoreLayout,
}

impl SqliteRecordStore {
    pub fn open(db_path: impl AsRef<Path>, layout: StoreLayout) -> Result<Self> {
        let conn = open_records_db(db_path, &layout)?;
        Ok(Self { conn, layout })
    }

    pub fn open_in_memory(layout: StoreLayout) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        ensure_schema(&conn, &layout)?;
        Ok(Self { conn, layout })
    }

    /// Wrap an existing connection; the table must already exist
    pub fn new(conn: Connection, layout: StoreLayout) -> Self {
        Self { conn, layout }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn insert(&self, record: &EncryptedRecord) -> Result<i64> {
        let l = &self.layout;
        self.conn.execute(
            &format!(
                "INSERT INTO {} ({}, {}) VALUES (?1, ?2)",
                l.table, l.ciphertext_column, l.wrapped_key_column
            ),
            params![record.ciphertext, record.wrapped_key],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get(&self, id: i64) -> Result<Option<EncryptedRecord>> {
        let l = &self.layout;
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {}, {} FROM {} WHERE {} = ?1",
                    l.ciphertext_column, l.wrapped_key_column, l.table, l.id_column
                ),
                [id],
                |row| Ok(EncryptedRecord::new(row.get::<_, String>(0)?, row.get(1)?)),
            )
            .optional()?)
    }

    /// Overwrite a row's two columns unconditionally (normal application writes)
    pub fn update(&self, id: i64, record: &EncryptedRecord) -> Result<bool> {
        let l = &self.layout;
        let rows = self.conn.execute(
            &format!(
                "UPDATE {} SET {} = ?1, {} = ?2 WHERE {} = ?3",
                l.table, l.ciphertext_column, l.wrapped_key_column, l.id_column
            ),
            params![record.ciphertext, record.wrapped_key, id],
        )?;
        Ok(rows == 1)
    }

    fn candidate_filter(&self) -> String {
        let l = &self.layout;
        format!(
            "(({wk} IS NOT NULL AND {wk} <> '') OR {ct} LIKE '{like}')",
            wk = l.wrapped_key_column,
            ct = l.ciphertext_column,
            like = CONTAINER_LIKE,
        )
    }
}

impl RecordStore for SqliteRecordStore {
    fn count_candidates(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE {}",
                self.layout.table,
                self.candidate_filter()
            ),
            [],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn fetch_candidates(&self, after_id: Option<i64>, limit: usize) -> Result<Vec<StoredRow>> {
        let l = &self.layout;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {id}, {ct}, {wk} FROM {table} WHERE {id} > ?1 AND {filter} ORDER BY {id} LIMIT ?2",
            id = l.id_column,
            ct = l.ciphertext_column,
            wk = l.wrapped_key_column,
            table = l.table,
            filter = self.candidate_filter(),
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![after_id.unwrap_or(i64::MIN), limit], |row| {
                Ok(StoredRow {
                    id: row.get(0)?,
                    record: EncryptedRecord::new(row.get::<_, String>(1)?, row.get(2)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(after_id, fetched = rows.len(), "scanned candidate rows");
        Ok(rows)
    }

    fn commit_batch(&mut self, updates: &[StagedUpdate]) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }

        let l = self.layout.clone();
        let tx = self.conn.transaction()?;
        let mut applied = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "UPDATE {table} SET {ct} = ?1, {wk} = ?2 WHERE {id} = ?3 AND {ct} = ?4 AND {wk} IS ?5",
                table = l.table,
                ct = l.ciphertext_column,
                wk = l.wrapped_key_column,
                id = l.id_column,
            ))?;

            for update in updates {
                let rows = stmt.execute(params![
                    update.replacement.ciphertext,
                    update.replacement.wrapped_key,
                    update.id,
                    update.previous.ciphertext,
                    update.previous.wrapped_key,
                ])?;
                if rows == 0 {
                    warn!(
                        record_id = update.id,
                        "record changed since it was scanned; leaving it for a later run"
                    );
                }
                applied += rows;
            }
        }
        tx.commit()?;
        Ok(applied)
    }
}
