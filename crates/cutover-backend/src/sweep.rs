//! Periodic physical expiry sweep.

use std::time::Duration;

use chrono::Utc;
use cutover_state::StoreHandle;
use tokio::sync::broadcast;

/// Run the sweep loop until shutdown. The sweep is idempotent, so a
/// missed or doubled tick changes nothing; reads filter stale sessions
/// on their own and only rely on this loop to reclaim rows.
pub async fn run_sweeper(
    store: StoreHandle,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match store.expire_sessions(Utc::now()).await {
                    Ok(sweep) if sweep.removed > 0 => {
                        tracing::info!(removed = sweep.removed, kept = sweep.kept, "expired stale sessions");
                    }
                    Ok(sweep) if sweep.malformed > 0 => {
                        tracing::warn!(malformed = sweep.malformed, "kept unparsable session records");
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(error = %err, "expiry sweep skipped");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                tracing::debug!("expiry sweeper stopped");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutover_state::{BackendId, MemStore, SessionToken, spawn_store_task};

    #[tokio::test]
    async fn sweeper_reclaims_stale_sessions_and_stops_on_shutdown() {
        let (handle, _join) = spawn_store_task(MemStore::new(), Duration::from_secs(5));
        let stale = Utc::now() - chrono::Duration::seconds(600);
        handle
            .upsert_session(BackendId::Primary, SessionToken::mint(), stale)
            .await
            .expect("upsert");

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let sweeper = tokio::spawn(run_sweeper(
            handle.clone(),
            Duration::from_millis(10),
            shutdown_rx,
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).expect("signal");
        sweeper.await.expect("join");

        let state = handle.get_all(Utc::now()).await.expect("snapshot");
        assert_eq!(state.session_count(BackendId::Primary), 0);
    }
}
