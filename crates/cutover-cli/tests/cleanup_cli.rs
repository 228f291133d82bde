//! The offline cleanup must apply the same expiry predicate as the
//! live sweep.

use chrono::Utc;
use cutover_state::{BackendId, SessionToken, SqliteStore, StateStore};
use predicates::Predicate;
use tempfile::TempDir;

#[test]
fn cleanup_reclaims_only_stale_sessions() {
    let dir = TempDir::new().expect("tmp");
    let db = dir.path().join("state.db");

    {
        let mut store = SqliteStore::open(&db).expect("open");
        let now = Utc::now();
        store
            .upsert_session(
                BackendId::Primary,
                &SessionToken::mint(),
                now - chrono::Duration::minutes(10),
            )
            .expect("stale");
        store
            .upsert_session(BackendId::Secondary, &SessionToken::mint(), now)
            .expect("fresh");
    }

    let output = std::process::Command::new(assert_cmd::cargo::cargo_bin!("cutover"))
        .arg("cleanup")
        .arg("--db")
        .arg(&db)
        .output()
        .expect("run cleanup");
    assert!(output.status.success(), "cleanup should succeed");
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(
        predicates::str::contains("removed 1, kept 1").eval(&text),
        "unexpected cleanup output: {text}"
    );

    // Idempotent: a second run reclaims nothing.
    let output = std::process::Command::new(assert_cmd::cargo::cargo_bin!("cutover"))
        .arg("cleanup")
        .arg("--db")
        .arg(&db)
        .output()
        .expect("run cleanup again");
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(predicates::str::contains("removed 0, kept 1").eval(&text));
}
