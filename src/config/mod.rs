// src/config/mod.rs
//! Configuration system for encrypted-field-vault
//!
//! TOML file + environment overrides, loaded explicitly by the caller at
//! startup. Nothing here is cached globally.

pub use app::{load, load_from_path, Config, Features, Keys, Kms, Paths, Store};
pub use env::{apply_env_overrides, parse_bool};

mod app;
mod defaults;
mod env;
