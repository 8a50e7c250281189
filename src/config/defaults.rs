// src/config/defaults.rs
use crate::config::app::{Features, Paths, Store};
use crate::consts::{
    DEFAULT_CIPHERTEXT_COLUMN, DEFAULT_ID_COLUMN, DEFAULT_RECORDS_DB, DEFAULT_TABLE,
    DEFAULT_WRAPPED_KEY_COLUMN,
};

pub fn default_paths() -> Paths {
    Paths {
        records_db: DEFAULT_RECORDS_DB.into(),
    }
}

pub fn default_store() -> Store {
    Store {
        table: DEFAULT_TABLE.into(),
        id_column: DEFAULT_ID_COLUMN.into(),
        ciphertext_column: DEFAULT_CIPHERTEXT_COLUMN.into(),
        wrapped_key_column: DEFAULT_WRAPPED_KEY_COLUMN.into(),
    }
}

// Dev-friendly: a fresh checkout stores fields without any key setup.
pub fn default_features() -> Features {
    Features {
        allow_plaintext_storage: true,
        allow_weak_key_fallback: true,
    }
}

impl Default for Paths {
    fn default() -> Self {
        default_paths()
    }
}

impl Default for Store {
    fn default() -> Self {
        default_store()
    }
}

impl Default for Features {
    fn default() -> Self {
        default_features()
    }
}
