mod commands;
mod util;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::backend::BackendArgs;
use commands::cleanup::CleanupArgs;
use commands::router::RouterArgs;
use commands::status::StatusArgs;

#[derive(Parser, Debug)]
#[command(name = "cutover", version, about = "Blue-green session-aware routing")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one backend instance
    Backend(BackendArgs),

    /// Run the routing front door
    Router(RouterArgs),

    /// Expire stale sessions in the shared store
    Cleanup(CleanupArgs),

    /// Fetch and print the aggregated status document
    Status(StatusArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Backend(args) => commands::backend::cmd_backend(&args).await,
        Command::Router(args) => commands::router::cmd_router(&args).await,
        Command::Cleanup(args) => commands::cleanup::cmd_cleanup(&args),
        Command::Status(args) => commands::status::cmd_status(&args).await,
    }
}
