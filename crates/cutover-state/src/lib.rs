//! Shared session state for the blue-green pair: data model, routing
//! policy, and durable plus in-memory store backends behind a
//! single-writer store task.

mod mem_store;
pub mod policy;
mod sqlite_store;
mod task;
mod types;

pub use mem_store::MemStore;
pub use sqlite_store::SqliteStore;
pub use task::{StoreHandle, StoreMsg, spawn_store_task};
pub use types::{
    BackendAddrs, BackendId, BackendStatus, EXPIRY_WINDOW, ExpirySweep, SessionRecord,
    SessionToken, SharedState, Todo, expiry_cutoff, is_expired,
};

use chrono::{DateTime, Utc};
use std::{io, path::PathBuf};

pub type StoreResult<T> = Result<T, StoreError>;

/// Trait implemented by all shared-state backends.
///
/// Mutating operations are atomic with respect to concurrent callers of
/// the same database; within a process all access is serialized through
/// the store task (see [`spawn_store_task`]).
pub trait StateStore: Send {
    /// Insert or refresh a session under `identity`, creating the
    /// backend's status record on first use. Refreshing moves the
    /// session to `identity` if it was registered elsewhere, so a token
    /// is counted under at most one backend at a time.
    fn upsert_session(
        &mut self,
        identity: BackendId,
        token: &SessionToken,
        now: DateTime<Utc>,
    ) -> StoreResult<SessionRecord>;

    /// Snapshot of one backend. Sessions past the expiry window are
    /// never included, whether or not a sweep has run.
    fn get_status(
        &mut self,
        identity: BackendId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<BackendStatus>>;

    /// Snapshot of everything, same filtering as [`Self::get_status`].
    fn get_all(&mut self, now: DateTime<Utc>) -> StoreResult<SharedState>;

    /// Physically remove every session whose `last_active` is at or
    /// before `now` minus the expiry window. Idempotent.
    fn expire_sessions(&mut self, now: DateTime<Utc>) -> StoreResult<ExpirySweep>;

    fn list_todos(&mut self) -> StoreResult<Vec<Todo>>;
    fn add_todo(&mut self, text: &str, now: DateTime<Utc>) -> StoreResult<Todo>;
    fn toggle_todo(&mut self, id: &str) -> StoreResult<Option<Todo>>;
    fn remove_todo(&mut self, id: &str) -> StoreResult<bool>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("state store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub(crate) fn io_error(path: impl Into<PathBuf>, err: io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source: err,
    }
}
