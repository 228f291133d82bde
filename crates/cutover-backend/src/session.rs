//! Per-backend session tracking.

use chrono::{DateTime, Utc};
use cutover_state::{BackendId, SessionToken, StoreHandle};

/// Registers or refreshes the caller's session on every request.
#[derive(Clone)]
pub struct SessionTracker {
    identity: BackendId,
    store: StoreHandle,
}

impl SessionTracker {
    pub fn new(identity: BackendId, store: StoreHandle) -> Self {
        Self { identity, store }
    }

    /// Resolve the inbound token (minting one for unknown callers) and
    /// upsert it into the shared store. A store failure skips the touch
    /// and logs; the request itself must never fail on this path.
    pub async fn touch(&self, inbound: Option<&str>, now: DateTime<Utc>) -> SessionToken {
        let token = inbound
            .and_then(SessionToken::parse)
            .unwrap_or_else(SessionToken::mint);
        if let Err(err) = self
            .store
            .upsert_session(self.identity, token.clone(), now)
            .await
        {
            tracing::warn!(identity = %self.identity, error = %err, "session touch skipped");
        }
        token
    }
}
