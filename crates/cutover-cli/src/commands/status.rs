//! `cutover status` command.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use cutover_router::StatusClient;
use cutover_state::BackendAddrs;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Backend base URL to query (env: CUTOVER_STATUS_URL)
    #[arg(long, env = "CUTOVER_STATUS_URL")]
    pub url: Option<String>,
}

pub async fn cmd_status(args: &StatusArgs) -> Result<()> {
    let base = args
        .url
        .clone()
        .unwrap_or_else(|| BackendAddrs::default().primary);
    let client = StatusClient::new(&base, Duration::from_secs(2))?;
    match client.fetch().await {
        Some(snapshot) => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        None => anyhow::bail!("status endpoint at {base} is unreachable"),
    }
}
