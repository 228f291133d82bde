//! Durable SQLite backend for the shared state.
//!
//! Every mutating operation runs inside an immediate transaction, so
//! concurrent backend processes sharing one database file cannot lose
//! or corrupt entries. Reads filter sessions by the expiry cutoff at
//! query time; the physical sweep only reclaims rows.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::types::{
    BackendId, BackendStatus, ExpirySweep, SessionRecord, SessionToken, SharedState, Todo,
    is_expired,
};
use crate::{StateStore, StoreResult, io_error};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS backends (
    identity   TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    color      TEXT NOT NULL,
    start_time TEXT NOT NULL,
    port       INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS sessions (
    token       TEXT PRIMARY KEY,
    identity    TEXT NOT NULL,
    start_time  TEXT NOT NULL,
    last_active TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_identity ON sessions(identity);
CREATE TABLE IF NOT EXISTS todos (
    id         TEXT PRIMARY KEY,
    text       TEXT NOT NULL,
    created_at TEXT NOT NULL,
    completed  INTEGER NOT NULL DEFAULT 0
);
";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }
}

fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn load_sessions(
    conn: &Connection,
    identity: BackendId,
    now: DateTime<Utc>,
) -> StoreResult<std::collections::BTreeMap<SessionToken, SessionRecord>> {
    let mut stmt =
        conn.prepare("SELECT token, start_time, last_active FROM sessions WHERE identity = ?1")?;
    let rows = stmt.query_map([identity.key()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut sessions = std::collections::BTreeMap::new();
    for row in rows {
        let (token, start_raw, active_raw) = row?;
        let (Some(created_at), Some(last_active)) = (parse_ts(&start_raw), parse_ts(&active_raw))
        else {
            tracing::warn!(%token, "session record has malformed timestamps, keeping it");
            continue;
        };
        if is_expired(last_active, now) {
            continue;
        }
        sessions.insert(
            SessionToken::from_raw(token),
            SessionRecord {
                created_at,
                last_active,
            },
        );
    }
    Ok(sessions)
}

fn load_backend_row(
    conn: &Connection,
    identity: BackendId,
) -> StoreResult<Option<(String, String, String, u16)>> {
    Ok(conn
        .query_row(
            "SELECT name, color, start_time, port FROM backends WHERE identity = ?1",
            [identity.key()],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get::<_, i64>(3)? as u16,
                ))
            },
        )
        .optional()?)
}

impl StateStore for SqliteStore {
    fn upsert_session(
        &mut self,
        identity: BackendId,
        token: &SessionToken,
        now: DateTime<Utc>,
    ) -> StoreResult<SessionRecord> {
        let now_raw = now.to_rfc3339();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO backends (identity, name, color, start_time, port)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(identity) DO NOTHING",
            params![
                identity.key(),
                identity.display_name(),
                identity.color(),
                now_raw,
                identity.default_port(),
            ],
        )?;
        let existing_start: Option<String> = tx
            .query_row(
                "SELECT start_time FROM sessions WHERE token = ?1",
                [token.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        // The token is the primary key across both identities, so this
        // upsert is also what keeps session assignment sticky: a token
        // seen on the other backend moves here instead of duplicating.
        tx.execute(
            "INSERT INTO sessions (token, identity, start_time, last_active)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(token) DO UPDATE
             SET identity = excluded.identity, last_active = excluded.last_active",
            params![token.as_str(), identity.key(), now_raw],
        )?;
        tx.commit()?;

        let created_at = existing_start.as_deref().and_then(parse_ts).unwrap_or(now);
        Ok(SessionRecord {
            created_at,
            last_active: now,
        })
    }

    fn get_status(
        &mut self,
        identity: BackendId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<BackendStatus>> {
        let Some((name, color, start_raw, port)) = load_backend_row(&self.conn, identity)? else {
            return Ok(None);
        };
        let started_at = parse_ts(&start_raw).unwrap_or_else(|| {
            tracing::warn!(%identity, "backend record has a malformed start time");
            now
        });
        let sessions = load_sessions(&self.conn, identity, now)?;
        Ok(Some(BackendStatus {
            name,
            color,
            sessions,
            started_at,
            port,
        }))
    }

    fn get_all(&mut self, now: DateTime<Utc>) -> StoreResult<SharedState> {
        let mut state = SharedState::default();
        for identity in [BackendId::Primary, BackendId::Secondary] {
            if let Some(status) = self.get_status(identity, now)? {
                state.backends.insert(identity, status);
            }
        }
        Ok(state)
    }

    fn expire_sessions(&mut self, now: DateTime<Utc>) -> StoreResult<ExpirySweep> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut sweep = ExpirySweep::default();
        let mut expired = Vec::new();
        {
            let mut stmt = tx.prepare("SELECT token, last_active FROM sessions")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (token, active_raw) = row?;
                match parse_ts(&active_raw) {
                    Some(last_active) if is_expired(last_active, now) => expired.push(token),
                    Some(_) => sweep.kept += 1,
                    None => {
                        tracing::warn!(%token, "session record has a malformed last_active, keeping it");
                        sweep.malformed += 1;
                        sweep.kept += 1;
                    }
                }
            }
        }
        for token in &expired {
            tx.execute("DELETE FROM sessions WHERE token = ?1", [token])?;
        }
        tx.commit()?;
        sweep.removed = expired.len();
        Ok(sweep)
    }

    fn list_todos(&mut self) -> StoreResult<Vec<Todo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, text, created_at, completed FROM todos ORDER BY created_at, id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)? != 0,
            ))
        })?;
        let mut todos = Vec::new();
        for row in rows {
            let (id, text, created_raw, completed) = row?;
            let Some(created_at) = parse_ts(&created_raw) else {
                tracing::warn!(%id, "todo record has a malformed timestamp, keeping it");
                continue;
            };
            todos.push(Todo {
                id,
                text,
                created_at,
                completed,
            });
        }
        Ok(todos)
    }

    fn add_todo(&mut self, text: &str, now: DateTime<Utc>) -> StoreResult<Todo> {
        let todo = Todo::new(text, now);
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO todos (id, text, created_at, completed) VALUES (?1, ?2, ?3, ?4)",
            params![
                todo.id,
                todo.text,
                todo.created_at.to_rfc3339(),
                todo.completed as i64,
            ],
        )?;
        tx.commit()?;
        Ok(todo)
    }

    fn toggle_todo(&mut self, id: &str) -> StoreResult<Option<Todo>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE todos SET completed = 1 - completed WHERE id = ?1",
            [id],
        )?;
        let todo = if changed > 0 {
            tx.query_row(
                "SELECT id, text, created_at, completed FROM todos WHERE id = ?1",
                [id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)? != 0,
                    ))
                },
            )
            .optional()?
            .and_then(|(id, text, created_raw, completed)| {
                parse_ts(&created_raw).map(|created_at| Todo {
                    id,
                    text,
                    created_at,
                    completed,
                })
            })
        } else {
            None
        };
        tx.commit()?;
        Ok(todo)
    }

    fn remove_todo(&mut self, id: &str) -> StoreResult<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute("DELETE FROM todos WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn open(dir: &TempDir) -> SqliteStore {
        SqliteStore::open(dir.path().join("state.db")).expect("open")
    }

    #[test]
    fn distinct_upserts_count_distinctly() {
        let dir = TempDir::new().expect("tmp");
        let mut store = open(&dir);
        let t = now();
        for _ in 0..5 {
            store
                .upsert_session(BackendId::Primary, &SessionToken::mint(), t)
                .expect("upsert");
        }
        let status = store
            .get_status(BackendId::Primary, t)
            .expect("status")
            .expect("present");
        assert_eq!(status.sessions.len(), 5);
        assert_eq!(status.name, "Primary");
        assert_eq!(status.color, "blue");
        assert_eq!(status.port, 5001);
    }

    #[test]
    fn refresh_keeps_created_at() {
        let dir = TempDir::new().expect("tmp");
        let mut store = open(&dir);
        let token = SessionToken::mint();
        let t0 = now();
        let t1 = t0 + chrono::Duration::seconds(60);

        let first = store
            .upsert_session(BackendId::Primary, &token, t0)
            .expect("insert");
        let second = store
            .upsert_session(BackendId::Primary, &token, t1)
            .expect("refresh");
        assert_eq!(first.created_at, t0);
        assert_eq!(second.created_at, t0);
        assert_eq!(second.last_active, t1);

        let status = store
            .get_status(BackendId::Primary, t1)
            .expect("status")
            .expect("present");
        assert_eq!(status.sessions.len(), 1);
    }

    #[test]
    fn sticky_assignment_moves_token() {
        let dir = TempDir::new().expect("tmp");
        let mut store = open(&dir);
        let token = SessionToken::mint();
        let t = now();

        store
            .upsert_session(BackendId::Primary, &token, t)
            .expect("primary");
        store
            .upsert_session(BackendId::Secondary, &token, t)
            .expect("secondary");

        let state = store.get_all(t).expect("snapshot");
        assert_eq!(state.session_count(BackendId::Primary), 0);
        assert_eq!(state.session_count(BackendId::Secondary), 1);
    }

    #[test]
    fn expiry_boundary_and_idempotence() {
        let dir = TempDir::new().expect("tmp");
        let mut store = open(&dir);
        let t = now();

        let stale = SessionToken::mint();
        let fresh = SessionToken::mint();
        store
            .upsert_session(BackendId::Primary, &stale, t - chrono::Duration::seconds(301))
            .expect("stale");
        store
            .upsert_session(BackendId::Primary, &fresh, t - chrono::Duration::seconds(299))
            .expect("fresh");

        let sweep = store.expire_sessions(t).expect("sweep");
        assert_eq!(sweep.removed, 1);
        assert_eq!(sweep.kept, 1);

        let again = store.expire_sessions(t).expect("sweep again");
        assert_eq!(again.removed, 0);
        assert_eq!(again.kept, 1);

        let status = store
            .get_status(BackendId::Primary, t)
            .expect("status")
            .expect("present");
        assert!(status.sessions.contains_key(&fresh));
        assert!(!status.sessions.contains_key(&stale));
    }

    #[test]
    fn reads_filter_stale_sessions_without_a_sweep() {
        let dir = TempDir::new().expect("tmp");
        let mut store = open(&dir);
        let t = now();
        store
            .upsert_session(
                BackendId::Primary,
                &SessionToken::mint(),
                t - chrono::Duration::seconds(600),
            )
            .expect("old");

        let state = store.get_all(t).expect("snapshot");
        assert_eq!(state.session_count(BackendId::Primary), 0);
    }

    #[test]
    fn state_survives_reopen() {
        let dir = TempDir::new().expect("tmp");
        let t = now();
        let token = SessionToken::mint();
        {
            let mut store = open(&dir);
            store
                .upsert_session(BackendId::Secondary, &token, t)
                .expect("upsert");
        }
        let mut store = open(&dir);
        let status = store
            .get_status(BackendId::Secondary, t)
            .expect("status")
            .expect("present");
        assert!(status.sessions.contains_key(&token));
        assert_eq!(status.color, "green");
    }

    #[test]
    fn malformed_last_active_is_kept_and_counted() {
        let dir = TempDir::new().expect("tmp");
        let mut store = open(&dir);
        let t = now();
        store
            .upsert_session(BackendId::Primary, &SessionToken::mint(), t)
            .expect("upsert");
        store
            .conn
            .execute("UPDATE sessions SET last_active = 'garbage'", [])
            .expect("corrupt");

        let sweep = store.expire_sessions(t).expect("sweep");
        assert_eq!(sweep.removed, 0);
        assert_eq!(sweep.malformed, 1);

        // Still on disk afterwards.
        let rows: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))
            .expect("count");
        assert_eq!(rows, 1);
    }

    #[test]
    fn todo_crud_round_trip() {
        let dir = TempDir::new().expect("tmp");
        let mut store = open(&dir);
        let t = now();

        let todo = store.add_todo("write the runbook", t).expect("add");
        assert!(!todo.completed);

        let toggled = store
            .toggle_todo(&todo.id)
            .expect("toggle")
            .expect("present");
        assert!(toggled.completed);

        assert!(store.remove_todo(&todo.id).expect("remove"));
        assert!(!store.remove_todo(&todo.id).expect("remove again"));
        assert!(store.list_todos().expect("list").is_empty());
    }
}
