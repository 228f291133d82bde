use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use cutover_state::policy::choose_backend;
use cutover_state::{BackendId, SessionToken, SharedState, StoreError};
use serde::Deserialize;

use super::AppState;

pub fn tracked_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/api/server", get(server_info))
        .route("/api/todos", get(todos_list).post(todos_add))
        .route("/api/todos/{id}/toggle", post(todos_toggle))
        .route("/api/todos/{id}", delete(todos_remove))
}

#[derive(Debug)]
enum ApiError {
    Store(StoreError),
    Invalid(&'static str),
    NotFound(&'static str),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Store(err) => {
                let status = match err {
                    StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, "store_error", err.to_string())
            }
            ApiError::Invalid(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg.into()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.into()),
        };
        let body = serde_json::json!({ "code": code, "message": message });
        (status, Json(body)).into_response()
    }
}

/// Main page. Applies the routing policy to the caller: an overloaded
/// Primary bounces new arrivals to Secondary; Secondary serves whatever
/// reaches it.
async fn index(State(state): State<AppState>) -> Response {
    let now = Utc::now();
    let snapshot = state.store.get_all(now).await.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "status snapshot unavailable, serving locally");
        SharedState::default()
    });

    let target = choose_backend(&snapshot, state.identity);
    if target != state.identity && target == BackendId::Secondary {
        if let Some(res) = redirect_to(state.addrs.get(target)) {
            return res;
        }
        tracing::warn!(target = %target, "redirect target is not a valid header value");
    }

    let todos = state.store.list_todos().await.unwrap_or_default();
    Json(serde_json::json!({
        "server": state.identity.display_name(),
        "color": state.identity.color(),
        "active_sessions": snapshot.session_count(state.identity),
        "todos": todos,
    }))
    .into_response()
}

/// Aggregated shared state, exactly as the router consumes it. Store
/// failures degrade to an empty snapshot rather than a failed request.
pub async fn status(State(state): State<AppState>) -> Json<SharedState> {
    let snapshot = state
        .store
        .get_all(Utc::now())
        .await
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "status snapshot unavailable, returning empty state");
            SharedState::default()
        });
    Json(snapshot)
}

async fn server_info(
    State(state): State<AppState>,
    Extension(token): Extension<SessionToken>,
) -> Json<serde_json::Value> {
    let now = Utc::now();
    let active = state
        .store
        .get_status(state.identity, now)
        .await
        .ok()
        .flatten()
        .map(|s| s.sessions.len())
        .unwrap_or(0);
    Json(serde_json::json!({
        "server": state.identity.display_name(),
        "color": state.identity.color(),
        "port": state.identity.default_port(),
        "active_sessions": active,
        "session_id": token.as_str(),
        "uptime_secs": now.signed_duration_since(state.started_at).num_seconds(),
    }))
}

async fn todos_list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let todos = state.store.list_todos().await?;
    Ok(Json(todos))
}

#[derive(Debug, Deserialize)]
struct AddTodo {
    text: String,
}

async fn todos_add(
    State(state): State<AppState>,
    Json(payload): Json<AddTodo>,
) -> Result<impl IntoResponse, ApiError> {
    let text = payload.text.trim();
    if text.is_empty() {
        return Err(ApiError::Invalid("todo text must not be empty"));
    }
    let todo = state.store.add_todo(text.to_string(), Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(todo)))
}

async fn todos_toggle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.store.toggle_todo(id).await? {
        Some(todo) => Ok(Json(todo)),
        None => Err(ApiError::NotFound("no such todo")),
    }
}

async fn todos_remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if state.store.remove_todo(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("no such todo"))
    }
}

fn redirect_to(url: &str) -> Option<Response> {
    HeaderValue::from_str(url)
        .ok()
        .map(|loc| (StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, loc)]).into_response())
}
