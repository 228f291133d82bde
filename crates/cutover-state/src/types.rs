//! Core data model shared by the backends, the router, and the CLI.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inactivity threshold after which a session is no longer counted.
pub const EXPIRY_WINDOW: Duration = Duration::from_secs(5 * 60);

/// The point in time before which sessions are considered expired.
pub fn expiry_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - chrono::Duration::seconds(EXPIRY_WINDOW.as_secs() as i64)
}

/// The single expiry predicate used by live sweeps, filtered reads, and
/// the offline cleanup command.
pub fn is_expired(last_active: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    last_active <= expiry_cutoff(now)
}

/// One of the two interchangeable server roles. The color tags keep the
/// original blue/green naming visible to operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    Primary,
    Secondary,
}

impl BackendId {
    /// Lowercase wire key, also the JSON object key in status payloads.
    pub fn key(self) -> &'static str {
        match self {
            BackendId::Primary => "primary",
            BackendId::Secondary => "secondary",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            BackendId::Primary => "Primary",
            BackendId::Secondary => "Secondary",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            BackendId::Primary => "blue",
            BackendId::Secondary => "green",
        }
    }

    pub fn other(self) -> BackendId {
        match self {
            BackendId::Primary => BackendId::Secondary,
            BackendId::Secondary => BackendId::Primary,
        }
    }

    /// Fixed listen port for the identity.
    pub fn default_port(self) -> u16 {
        match self {
            BackendId::Primary => 5001,
            BackendId::Secondary => 5002,
        }
    }

    pub fn from_key(key: &str) -> Option<BackendId> {
        match key {
            "primary" => Some(BackendId::Primary),
            "secondary" => Some(BackendId::Secondary),
            _ => None,
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Base URLs clients are redirected to, one per identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendAddrs {
    pub primary: String,
    pub secondary: String,
}

impl Default for BackendAddrs {
    fn default() -> Self {
        Self {
            primary: format!("http://127.0.0.1:{}", BackendId::Primary.default_port()),
            secondary: format!("http://127.0.0.1:{}", BackendId::Secondary.default_port()),
        }
    }
}

impl BackendAddrs {
    pub fn get(&self, identity: BackendId) -> &str {
        match identity {
            BackendId::Primary => &self.primary,
            BackendId::Secondary => &self.secondary,
        }
    }
}

/// Opaque session token carried in the client's cookie.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept only well-formed tokens from the outside; anything else is
    /// treated as an unknown session.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(|u| Self(u.to_string()))
    }

    /// Wrap a token that is already trusted, e.g. read back from the
    /// store.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-session bookkeeping. `start_time` is the wire name the original
/// status document used for the creation timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "start_time")]
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

/// Status document for one backend, keyed by identity in [`SharedState`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackendStatus {
    pub name: String,
    pub color: String,
    pub sessions: BTreeMap<SessionToken, SessionRecord>,
    #[serde(rename = "start_time")]
    pub started_at: DateTime<Utc>,
    pub port: u16,
}

impl BackendStatus {
    pub fn new(identity: BackendId, now: DateTime<Utc>) -> Self {
        Self {
            name: identity.display_name().to_string(),
            color: identity.color().to_string(),
            sessions: BTreeMap::new(),
            started_at: now,
            port: identity.default_port(),
        }
    }
}

/// Aggregated state of both backends, exactly the `/api/status` payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedState {
    pub backends: BTreeMap<BackendId, BackendStatus>,
}

impl SharedState {
    pub fn get(&self, identity: BackendId) -> Option<&BackendStatus> {
        self.backends.get(&identity)
    }

    /// Live session count for an identity; 0 when it has no record.
    pub fn session_count(&self, identity: BackendId) -> usize {
        self.get(identity).map(|s| s.sessions.len()).unwrap_or(0)
    }
}

/// Outcome of one physical expiry sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExpirySweep {
    pub removed: usize,
    pub kept: usize,
    /// Rows whose timestamps could not be parsed; kept in place.
    pub malformed: usize,
}

/// Todo item riding along on both backends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub completed: bool,
}

impl Todo {
    pub fn new(text: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            created_at: now,
            completed: false,
        }
    }
}
