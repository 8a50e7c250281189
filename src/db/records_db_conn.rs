// src/db/records_db_conn.rs
use std::{fs, path::Path};

use rusqlite::Connection;
use tracing::debug;

use crate::db::record_store::StoreLayout;
use crate::error::Result;

/// Open (creating if needed) the records database at `db_path`
pub fn open_records_db(db_path: impl AsRef<Path>, layout: &StoreLayout) -> Result<Connection> {
    let db_path = db_path.as_ref();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    debug!(path = %db_path.display(), table = layout.table(), "opening records database");
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    ensure_schema(&conn, layout)?;
    Ok(conn)
}

/// Create the encrypted-field table if it does not exist yet
pub fn ensure_schema(conn: &Connection, layout: &StoreLayout) -> Result<()> {
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            {id} INTEGER PRIMARY KEY,
            {ct} TEXT NOT NULL,
            {wk} TEXT
        );
        "#,
        table = layout.table(),
        id = layout.id_column(),
        ct = layout.ciphertext_column(),
        wk = layout.wrapped_key_column(),
    ))?;
    Ok(())
}
