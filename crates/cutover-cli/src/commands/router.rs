//! `cutover router` command.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use cutover_router::RouterConfig;
use tokio::sync::broadcast;

use crate::util;

#[derive(Args, Debug)]
pub struct RouterArgs {
    /// Listen address override (env: CUTOVER_LISTEN)
    #[arg(long, env = "CUTOVER_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Primary backend base URL (env: CUTOVER_PRIMARY_URL)
    #[arg(long, env = "CUTOVER_PRIMARY_URL")]
    pub primary_url: Option<String>,

    /// Secondary backend base URL (env: CUTOVER_SECONDARY_URL)
    #[arg(long, env = "CUTOVER_SECONDARY_URL")]
    pub secondary_url: Option<String>,

    /// Status poll timeout in milliseconds (env: CUTOVER_STATUS_TIMEOUT_MS)
    #[arg(long, env = "CUTOVER_STATUS_TIMEOUT_MS")]
    pub status_timeout_ms: Option<u64>,
}

pub async fn cmd_router(args: &RouterArgs) -> Result<()> {
    util::setup_logging();

    let mut config = RouterConfig::default();
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(url) = &args.primary_url {
        config.addrs.primary = url.clone();
    }
    if let Some(url) = &args.secondary_url {
        config.addrs.secondary = url.clone();
    }
    if let Some(ms) = args.status_timeout_ms {
        config.status_timeout = Duration::from_millis(ms);
    }

    let (shutdown_tx, _) = broadcast::channel(1);
    util::spawn_shutdown_signal(shutdown_tx.clone());
    cutover_router::http::serve(&config, shutdown_tx).await?;
    Ok(())
}
