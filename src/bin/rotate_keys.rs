// src/bin/rotate_keys.rs
//! Re-wrap every envelope-encrypted journal field under a fresh data key
//!
//! Dry-run by default. Writing requires both `--commit` and `--yes`.
//!
//! Exit codes: 0 = completed, 2 = unrecoverable config/backend/storage
//! error, 3 = `--commit` without `--yes`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use encrypted_field_vault::consts::DEFAULT_BATCH_SIZE;
use encrypted_field_vault::db::{SqliteRecordStore, StoreLayout};
use encrypted_field_vault::kms::backend_from_config;
use encrypted_field_vault::{
    load_config, MasterKeyId, RotationJob, RotationOptions, RotationReport, RunLock,
};

const EXIT_FAILURE: u8 = 2;
const EXIT_UNCONFIRMED: u8 = 3;

#[derive(Debug, Parser)]
#[command(name = "rotate_keys", version, about = "Rotate journal encryption keys")]
struct Args {
    /// Target KMS key id (or alias) to wrap new data keys
    #[arg(long, env = "EFV_TARGET_MASTER_KEY_ID")]
    target_master_key_id: String,

    /// Records per batch (one transaction each)
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Actually write changes (default is dry-run)
    #[arg(long)]
    commit: bool,

    /// Required together with --commit to apply changes
    #[arg(long)]
    yes: bool,

    /// Number of batches to run (0 = until no candidates remain)
    #[arg(long, default_value_t = 0)]
    max_loops: u32,

    /// Records database (overrides paths.records_db / EFV_RECORDS_DB)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Also re-wrap records already under the target master key
    #[arg(long)]
    include_current: bool,

    /// Run lock file (default: the database path with a .rotate.lock extension)
    #[arg(long)]
    lock_file: Option<PathBuf>,

    /// Print the final report as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if args.commit && !args.yes {
        error!(
            "Refusing to run in commit mode without --yes confirmation. Re-run with --yes to apply changes."
        );
        return ExitCode::from(EXIT_UNCONFIRMED);
    }

    let json = args.json;
    match run(args) {
        Ok(report) => {
            if json {
                match serde_json::to_string_pretty(&report) {
                    Ok(text) => println!("{text}"),
                    Err(err) => {
                        error!("failed to serialize report: {err}");
                        return ExitCode::from(EXIT_FAILURE);
                    }
                }
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("rotation aborted: {err:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run(args: Args) -> Result<RotationReport> {
    let config = load_config().context("failed to load configuration")?;

    let backend = backend_from_config(&config)
        .context("failed to initialise the KMS backend")?
        .context("no KMS backend configured (set EFV_KMS_BACKEND or allow the weak fallback)")?;

    let db_path = args
        .db
        .unwrap_or_else(|| PathBuf::from(&config.paths.records_db));
    let lock_path = args
        .lock_file
        .unwrap_or_else(|| db_path.with_extension("rotate.lock"));
    let _lock = RunLock::acquire(&lock_path)
        .with_context(|| format!("could not take run lock {}", lock_path.display()))?;

    let layout = StoreLayout::from_config(&config.store)?;
    let mut store = SqliteRecordStore::open(&db_path, layout)
        .with_context(|| format!("failed to open records database {}", db_path.display()))?;

    let mut options = RotationOptions::new(MasterKeyId::new(args.target_master_key_id)?)
        .with_batch_size(args.batch_size)
        .with_max_loops(args.max_loops)
        .with_include_current(args.include_current);
    if args.commit {
        options = options.with_commit(args.yes);
    }

    info!(
        db = %db_path.display(),
        backend = backend.name(),
        "Encrypted Field Vault: key rotation"
    );

    let report = RotationJob::new(&mut store, backend, options).run()?;

    info!(
        examined = report.records_examined,
        rewrapped = report.records_rewrapped,
        changed = report.records_changed,
        failed = report.records_failed,
        skipped = report.records_skipped,
        batches = report.batches.len(),
        "=== ROTATION COMPLETE ==="
    );
    Ok(report)
}
