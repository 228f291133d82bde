//! The router's own HTTP surface.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use cutover_state::policy::choose_backend;
use cutover_state::{BackendAddrs, BackendId};
use tokio::sync::broadcast;

use crate::client::StatusClient;
use crate::{RouterConfig, RouterError};

#[derive(Clone)]
pub struct RouterState {
    pub client: Arc<StatusClient>,
    pub addrs: BackendAddrs,
    pub probe_timeout: Duration,
}

pub fn router(state: RouterState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Redirect the client to whichever backend the policy picks, with a
/// reachability fallback to the alternate when the chosen one is down.
/// The routing path never fails the request: with both backends dark
/// the client still gets the policy's redirect.
async fn index(State(state): State<RouterState>) -> Response {
    let snapshot = state.client.fetch().await.unwrap_or_default();
    let mut target = choose_backend(&snapshot, BackendId::Primary);

    if !state
        .client
        .probe(state.addrs.get(target), state.probe_timeout)
        .await
    {
        let alternate = target.other();
        if state
            .client
            .probe(state.addrs.get(alternate), state.probe_timeout)
            .await
        {
            tracing::warn!(chosen = %target, "chosen backend unreachable, using the alternate");
            target = alternate;
        } else {
            tracing::warn!("both backends unreachable, redirecting to the policy choice");
        }
    }

    match redirect_to(state.addrs.get(target)) {
        Some(res) => res,
        None => {
            tracing::error!(target = %target, "redirect target is not a valid header value");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

async fn healthz() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "ok": true }))
}

fn redirect_to(url: &str) -> Option<Response> {
    HeaderValue::from_str(url)
        .ok()
        .map(|loc| (StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, loc)]).into_response())
}

pub async fn serve(
    config: &RouterConfig,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), RouterError> {
    let client = StatusClient::new(&config.addrs.primary, config.status_timeout)?;
    let state = RouterState {
        client: Arc::new(client),
        addrs: config.addrs.clone(),
        probe_timeout: config.probe_timeout,
    };
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .map_err(|e| RouterError::Bind {
            addr: config.listen,
            source: e,
        })?;
    tracing::info!("router listening on http://{}", config.listen);
    let mut shutdown_rx = shutdown_tx.subscribe();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .map_err(|e| RouterError::Serve(e.to_string()))
}
