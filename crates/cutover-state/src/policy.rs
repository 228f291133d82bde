//! Session-count routing policy.
//!
//! The rule is deliberately asymmetric: it always measures Primary's
//! load, no matter which identity is asking, and never bounces a
//! request that is already on Secondary. This is the documented
//! behavior of the system, not a general load-balancing rule.

use crate::{BackendId, SharedState};

/// Sessions on Primary above which new arrivals spill to Secondary.
pub const SESSION_THRESHOLD: usize = 3;

/// Pick the backend a request should be served by.
///
/// An empty snapshot (cold start, or the store was unreachable and the
/// caller substituted a default) counts Primary as 0 and fails open to
/// Primary.
pub fn choose_backend(state: &SharedState, requesting: BackendId) -> BackendId {
    let primary_sessions = state.session_count(BackendId::Primary);
    if primary_sessions > SESSION_THRESHOLD && requesting != BackendId::Secondary {
        BackendId::Secondary
    } else {
        BackendId::Primary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BackendStatus, SessionRecord, SessionToken};
    use chrono::{TimeZone, Utc};

    fn state_with_primary_sessions(n: usize) -> SharedState {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut status = BackendStatus::new(BackendId::Primary, now);
        for _ in 0..n {
            status.sessions.insert(
                SessionToken::mint(),
                SessionRecord {
                    created_at: now,
                    last_active: now,
                },
            );
        }
        let mut state = SharedState::default();
        state.backends.insert(BackendId::Primary, status);
        state
    }

    #[test]
    fn below_threshold_stays_on_primary() {
        let state = state_with_primary_sessions(3);
        assert_eq!(
            choose_backend(&state, BackendId::Primary),
            BackendId::Primary
        );
    }

    #[test]
    fn above_threshold_spills_to_secondary() {
        let state = state_with_primary_sessions(4);
        assert_eq!(
            choose_backend(&state, BackendId::Primary),
            BackendId::Secondary
        );
    }

    #[test]
    fn secondary_requests_always_resolve_to_primary() {
        for n in [0, 4, 100] {
            let state = state_with_primary_sessions(n);
            assert_eq!(
                choose_backend(&state, BackendId::Secondary),
                BackendId::Primary
            );
        }
    }

    #[test]
    fn cold_start_fails_open_to_primary() {
        let state = SharedState::default();
        assert_eq!(
            choose_backend(&state, BackendId::Primary),
            BackendId::Primary
        );
    }
}
