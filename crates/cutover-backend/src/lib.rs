//! Backend host: session tracking, status API, todos, and the periodic
//! expiry sweep, wired around the shared state store.

pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod sweep;

pub use config::{BackendConfig, DEFAULT_DB_PATH};
pub use error::BackendError;
pub use http::AppState;
pub use session::SessionTracker;

use chrono::Utc;
use cutover_state::{SqliteStore, spawn_store_task};
use tokio::sync::broadcast;

/// Open the durable store and run one backend until shutdown.
pub async fn run(
    config: BackendConfig,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), BackendError> {
    let store = SqliteStore::open(&config.db_path)?;
    let (handle, _store_thread) = spawn_store_task(store, config.store_op_timeout);

    let state = AppState {
        identity: config.identity,
        tracker: SessionTracker::new(config.identity, handle.clone()),
        store: handle.clone(),
        addrs: config.addrs.clone(),
        started_at: Utc::now(),
    };

    let sweeper = tokio::spawn(sweep::run_sweeper(
        handle,
        config.sweep_interval,
        shutdown_tx.subscribe(),
    ));
    let result = http::serve(&config, state, shutdown_tx).await;
    let _ = sweeper.await;
    result
}
