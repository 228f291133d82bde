//! `cutover backend` command.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};
use cutover_backend::BackendConfig;
use cutover_state::BackendId;
use tokio::sync::broadcast;

use crate::util;

#[derive(Args, Debug)]
pub struct BackendArgs {
    /// Identity to run as (env: CUTOVER_IDENTITY)
    #[arg(long, value_enum, env = "CUTOVER_IDENTITY")]
    pub identity: IdentityArg,

    /// Listen address override (env: CUTOVER_LISTEN)
    #[arg(long, env = "CUTOVER_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Shared SQLite database path (env: CUTOVER_DB)
    #[arg(long, env = "CUTOVER_DB")]
    pub db: Option<PathBuf>,

    /// Primary backend base URL (env: CUTOVER_PRIMARY_URL)
    #[arg(long, env = "CUTOVER_PRIMARY_URL")]
    pub primary_url: Option<String>,

    /// Secondary backend base URL (env: CUTOVER_SECONDARY_URL)
    #[arg(long, env = "CUTOVER_SECONDARY_URL")]
    pub secondary_url: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum IdentityArg {
    Primary,
    Secondary,
}

impl From<IdentityArg> for BackendId {
    fn from(arg: IdentityArg) -> Self {
        match arg {
            IdentityArg::Primary => BackendId::Primary,
            IdentityArg::Secondary => BackendId::Secondary,
        }
    }
}

pub async fn cmd_backend(args: &BackendArgs) -> Result<()> {
    util::setup_logging();

    let mut config = BackendConfig::for_identity(args.identity.into());
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(db) = &args.db {
        config.db_path = db.clone();
    }
    if let Some(url) = &args.primary_url {
        config.addrs.primary = url.clone();
    }
    if let Some(url) = &args.secondary_url {
        config.addrs.secondary = url.clone();
    }

    let (shutdown_tx, _) = broadcast::channel(1);
    util::spawn_shutdown_signal(shutdown_tx.clone());
    cutover_backend::run(config, shutdown_tx).await?;
    Ok(())
}
