pub mod api;
pub mod session_layer;

use axum::{Router, middleware};
use chrono::{DateTime, Utc};
use cutover_state::{BackendAddrs, BackendId, StoreHandle};
use tokio::sync::broadcast;

use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::session::SessionTracker;

#[derive(Clone)]
pub struct AppState {
    pub identity: BackendId,
    pub tracker: SessionTracker,
    pub store: StoreHandle,
    pub addrs: BackendAddrs,
    pub started_at: DateTime<Utc>,
}

/// Build the backend's router. Every route except the status endpoint
/// goes through the session layer; the status service is read-only, so
/// the router's polls must not mint sessions of their own.
pub fn router(state: AppState) -> Router {
    let tracked = Router::new()
        .merge(api::tracked_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_layer::touch_session,
        ));
    Router::new()
        .route("/api/status", axum::routing::get(api::status))
        .merge(tracked)
        .with_state(state)
}

pub async fn serve(
    config: &BackendConfig,
    state: AppState,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), BackendError> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .map_err(|e| BackendError::Bind {
            addr: config.listen,
            source: e,
        })?;
    tracing::info!(
        "{} backend listening on http://{}",
        config.identity.display_name(),
        config.listen
    );
    let mut shutdown_rx = shutdown_tx.subscribe();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .map_err(|e| BackendError::Serve(e.to_string()))
}
