use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use cutover_state::{BackendAddrs, BackendId};

/// Database file both backends share.
pub const DEFAULT_DB_PATH: &str = "data/cutover.db";

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub identity: BackendId,
    pub listen: SocketAddr,
    pub db_path: PathBuf,
    /// Redirect targets, one per identity.
    pub addrs: BackendAddrs,
    /// Bound on every store call; expiry falls back to the degraded
    /// path beyond it.
    pub store_op_timeout: Duration,
    pub sweep_interval: Duration,
}

impl BackendConfig {
    pub fn for_identity(identity: BackendId) -> Self {
        Self {
            identity,
            listen: SocketAddr::from(([127, 0, 0, 1], identity.default_port())),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            addrs: BackendAddrs::default(),
            store_op_timeout: Duration::from_secs(2),
            sweep_interval: Duration::from_secs(30),
        }
    }
}
