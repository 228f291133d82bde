//! Routing front door: polls the Primary backend's status service and
//! redirects each client to the backend the policy picks.

pub mod client;
pub mod http;

pub use client::StatusClient;
pub use http::RouterState;

use std::net::SocketAddr;
use std::time::Duration;

use cutover_state::BackendAddrs;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub listen: SocketAddr,
    pub addrs: BackendAddrs,
    /// Bound on the status poll; beyond it the router fails open to
    /// Primary.
    pub status_timeout: Duration,
    /// Bound on the pre-redirect reachability probe.
    pub probe_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 5000)),
            addrs: BackendAddrs::default(),
            status_timeout: Duration::from_secs(2),
            probe_timeout: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("http server error: {0}")]
    Serve(String),
}
