//! `cutover cleanup` command: the offline expiry sweep.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use cutover_backend::DEFAULT_DB_PATH;
use cutover_state::{SqliteStore, StateStore};

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Shared SQLite database path (env: CUTOVER_DB)
    #[arg(long, env = "CUTOVER_DB")]
    pub db: Option<PathBuf>,
}

/// Apply the same expiry predicate the backends use and report what was
/// reclaimed.
pub fn cmd_cleanup(args: &CleanupArgs) -> Result<()> {
    let path = args
        .db
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
    let mut store = SqliteStore::open(&path)?;
    let sweep = store.expire_sessions(Utc::now())?;
    println!(
        "session cleanup complete: removed {}, kept {}",
        sweep.removed, sweep.kept
    );
    if sweep.malformed > 0 {
        eprintln!(
            "notice: kept {} session record(s) with unparsable timestamps",
            sweep.malformed
        );
    }
    Ok(())
}
