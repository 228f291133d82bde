//! Session cookie layer: the before-request touch.

use axum::extract::{Request, State};
use axum::http::{HeaderValue, header};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

use super::AppState;

pub const SESSION_COOKIE: &str = "cutover_session";

/// Touch the caller's session before the handler runs and hand the
/// resolved token down through request extensions. The cookie is
/// re-issued on every response, which also refreshes its lifetime.
pub async fn touch_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let inbound = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| cookie_value(raw, SESSION_COOKIE));
    let token = state.tracker.touch(inbound.as_deref(), Utc::now()).await;
    req.extensions_mut().insert(token.clone());

    let mut res = next.run(req).await;
    let cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly");
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        res.headers_mut().append(header::SET_COOKIE, value);
    }
    res
}

fn cookie_value(raw: &str, name: &str) -> Option<String> {
    raw.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}
