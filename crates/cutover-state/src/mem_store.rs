//! In-memory `StateStore`, used by tests and local experiments.

use chrono::{DateTime, Utc};

use crate::types::{
    BackendId, BackendStatus, ExpirySweep, SessionRecord, SessionToken, SharedState, Todo,
    is_expired,
};
use crate::{StateStore, StoreResult};

#[derive(Debug, Default)]
pub struct MemStore {
    state: SharedState,
    todos: Vec<Todo>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn filtered(status: &BackendStatus, now: DateTime<Utc>) -> BackendStatus {
        let mut out = status.clone();
        out.sessions
            .retain(|_, record| !is_expired(record.last_active, now));
        out
    }
}

impl StateStore for MemStore {
    fn upsert_session(
        &mut self,
        identity: BackendId,
        token: &SessionToken,
        now: DateTime<Utc>,
    ) -> StoreResult<SessionRecord> {
        // Sticky assignment: the token lives under exactly one identity.
        if let Some(other) = self.state.backends.get_mut(&identity.other()) {
            other.sessions.remove(token);
        }
        let status = self
            .state
            .backends
            .entry(identity)
            .or_insert_with(|| BackendStatus::new(identity, now));
        let record = status
            .sessions
            .entry(token.clone())
            .and_modify(|r| r.last_active = now)
            .or_insert(SessionRecord {
                created_at: now,
                last_active: now,
            });
        Ok(record.clone())
    }

    fn get_status(
        &mut self,
        identity: BackendId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<BackendStatus>> {
        Ok(self
            .state
            .backends
            .get(&identity)
            .map(|s| Self::filtered(s, now)))
    }

    fn get_all(&mut self, now: DateTime<Utc>) -> StoreResult<SharedState> {
        let mut out = SharedState::default();
        for (identity, status) in &self.state.backends {
            out.backends.insert(*identity, Self::filtered(status, now));
        }
        Ok(out)
    }

    fn expire_sessions(&mut self, now: DateTime<Utc>) -> StoreResult<ExpirySweep> {
        let mut sweep = ExpirySweep::default();
        for status in self.state.backends.values_mut() {
            let before = status.sessions.len();
            status
                .sessions
                .retain(|_, record| !is_expired(record.last_active, now));
            sweep.removed += before - status.sessions.len();
            sweep.kept += status.sessions.len();
        }
        Ok(sweep)
    }

    fn list_todos(&mut self) -> StoreResult<Vec<Todo>> {
        Ok(self.todos.clone())
    }

    fn add_todo(&mut self, text: &str, now: DateTime<Utc>) -> StoreResult<Todo> {
        let todo = Todo::new(text, now);
        self.todos.push(todo.clone());
        Ok(todo)
    }

    fn toggle_todo(&mut self, id: &str) -> StoreResult<Option<Todo>> {
        Ok(self.todos.iter_mut().find(|t| t.id == id).map(|t| {
            t.completed = !t.completed;
            t.clone()
        }))
    }

    fn remove_todo(&mut self, id: &str) -> StoreResult<bool> {
        let before = self.todos.len();
        self.todos.retain(|t| t.id != id);
        Ok(self.todos.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn upsert_then_expire() {
        let mut store = MemStore::new();
        let t = now();
        let token = SessionToken::mint();
        store
            .upsert_session(BackendId::Primary, &token, t)
            .expect("upsert");
        assert_eq!(
            store.get_all(t).expect("all").session_count(BackendId::Primary),
            1
        );

        let later = t + chrono::Duration::seconds(301);
        let sweep = store.expire_sessions(later).expect("sweep");
        assert_eq!(sweep.removed, 1);
        assert_eq!(
            store
                .get_all(later)
                .expect("all")
                .session_count(BackendId::Primary),
            0
        );
    }

    #[test]
    fn sticky_assignment() {
        let mut store = MemStore::new();
        let t = now();
        let token = SessionToken::mint();
        store
            .upsert_session(BackendId::Primary, &token, t)
            .expect("primary");
        store
            .upsert_session(BackendId::Secondary, &token, t)
            .expect("secondary");
        let state = store.get_all(t).expect("all");
        assert_eq!(state.session_count(BackendId::Primary), 0);
        assert_eq!(state.session_count(BackendId::Secondary), 1);
    }
}
