use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("store error: {0}")]
    Store(#[from] cutover_state::StoreError),
    #[error("bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("http server error: {0}")]
    Serve(String),
}
