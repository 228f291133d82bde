//! Single-writer store task.
//!
//! One dedicated thread owns the `StateStore` and drains a message
//! channel; everything else holds a cloneable [`StoreHandle`] and talks
//! to it with per-call reply channels. Combined with the transactional
//! SQLite backend this gives in-process serialization on top of the
//! cross-process atomicity of the database itself.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};

use crate::types::{
    BackendId, BackendStatus, ExpirySweep, SessionRecord, SessionToken, SharedState, Todo,
};
use crate::{StateStore, StoreError, StoreResult};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
pub enum StoreMsg {
    UpsertSession {
        identity: BackendId,
        token: SessionToken,
        now: DateTime<Utc>,
        resp: oneshot::Sender<StoreResult<SessionRecord>>,
    },
    GetStatus {
        identity: BackendId,
        now: DateTime<Utc>,
        resp: oneshot::Sender<StoreResult<Option<BackendStatus>>>,
    },
    GetAll {
        now: DateTime<Utc>,
        resp: oneshot::Sender<StoreResult<SharedState>>,
    },
    ExpireSessions {
        now: DateTime<Utc>,
        resp: oneshot::Sender<StoreResult<ExpirySweep>>,
    },
    ListTodos {
        resp: oneshot::Sender<StoreResult<Vec<Todo>>>,
    },
    AddTodo {
        text: String,
        now: DateTime<Utc>,
        resp: oneshot::Sender<StoreResult<Todo>>,
    },
    ToggleTodo {
        id: String,
        resp: oneshot::Sender<StoreResult<Option<Todo>>>,
    },
    RemoveTodo {
        id: String,
        resp: oneshot::Sender<StoreResult<bool>>,
    },
}

/// Cloneable async façade over the store task. Every call is bounded by
/// the operation timeout; a timeout or a stopped task surfaces as
/// [`StoreError::Unavailable`] so callers can fall back to their
/// degraded behavior.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreMsg>,
    op_timeout: Duration,
}

/// Spawn the store task; the thread exits when every handle is dropped.
pub fn spawn_store_task<S: StateStore + 'static>(
    mut store: S,
    op_timeout: Duration,
) -> (StoreHandle, std::thread::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    let join = std::thread::spawn(move || {
        while let Some(msg) = rx.blocking_recv() {
            dispatch(&mut store, msg);
        }
        tracing::debug!("store task stopped");
    });
    (StoreHandle { tx, op_timeout }, join)
}

fn dispatch<S: StateStore>(store: &mut S, msg: StoreMsg) {
    // A dropped receiver just means the caller timed out or went away.
    match msg {
        StoreMsg::UpsertSession {
            identity,
            token,
            now,
            resp,
        } => {
            let _ = resp.send(store.upsert_session(identity, &token, now));
        }
        StoreMsg::GetStatus {
            identity,
            now,
            resp,
        } => {
            let _ = resp.send(store.get_status(identity, now));
        }
        StoreMsg::GetAll { now, resp } => {
            let _ = resp.send(store.get_all(now));
        }
        StoreMsg::ExpireSessions { now, resp } => {
            let _ = resp.send(store.expire_sessions(now));
        }
        StoreMsg::ListTodos { resp } => {
            let _ = resp.send(store.list_todos());
        }
        StoreMsg::AddTodo { text, now, resp } => {
            let _ = resp.send(store.add_todo(&text, now));
        }
        StoreMsg::ToggleTodo { id, resp } => {
            let _ = resp.send(store.toggle_todo(&id));
        }
        StoreMsg::RemoveTodo { id, resp } => {
            let _ = resp.send(store.remove_todo(&id));
        }
    }
}

impl StoreHandle {
    pub async fn upsert_session(
        &self,
        identity: BackendId,
        token: SessionToken,
        now: DateTime<Utc>,
    ) -> StoreResult<SessionRecord> {
        self.call(|resp| StoreMsg::UpsertSession {
            identity,
            token,
            now,
            resp,
        })
        .await
    }

    pub async fn get_status(
        &self,
        identity: BackendId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<BackendStatus>> {
        self.call(|resp| StoreMsg::GetStatus {
            identity,
            now,
            resp,
        })
        .await
    }

    pub async fn get_all(&self, now: DateTime<Utc>) -> StoreResult<SharedState> {
        self.call(|resp| StoreMsg::GetAll { now, resp }).await
    }

    pub async fn expire_sessions(&self, now: DateTime<Utc>) -> StoreResult<ExpirySweep> {
        self.call(|resp| StoreMsg::ExpireSessions { now, resp })
            .await
    }

    pub async fn list_todos(&self) -> StoreResult<Vec<Todo>> {
        self.call(|resp| StoreMsg::ListTodos { resp }).await
    }

    pub async fn add_todo(&self, text: String, now: DateTime<Utc>) -> StoreResult<Todo> {
        self.call(|resp| StoreMsg::AddTodo { text, now, resp }).await
    }

    pub async fn toggle_todo(&self, id: String) -> StoreResult<Option<Todo>> {
        self.call(|resp| StoreMsg::ToggleTodo { id, resp }).await
    }

    pub async fn remove_todo(&self, id: String) -> StoreResult<bool> {
        self.call(|resp| StoreMsg::RemoveTodo { id, resp }).await
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<StoreResult<T>>) -> StoreMsg,
    ) -> StoreResult<T> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let msg = make(resp_tx);
        let round_trip = async {
            self.tx
                .send(msg)
                .await
                .map_err(|_| StoreError::Unavailable("store task stopped".into()))?;
            resp_rx
                .await
                .map_err(|_| StoreError::Unavailable("store task dropped the reply".into()))?
        };
        match tokio::time::timeout(self.op_timeout, round_trip).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "store call timed out after {:?}",
                self.op_timeout
            ))),
        }
    }
}
