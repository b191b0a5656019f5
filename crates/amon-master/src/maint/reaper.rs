//! The maintenance-expiry reaper.
//!
//! A single scheduled task pointed at the next window to expire. At most
//! one reap is in flight: arming cancels any prior timer before
//! scheduling, so poking is idempotent. Every create/delete (and any
//! bogus-window discovery) re-arms it.

use super::{parse_window_key, set_key, MaintenanceEngine, KEY_BY_END};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Floor on the reap delay, even when a window's end is already past.
pub const MIN_REAPER_GAP_MS: i64 = 100;

/// Back-off after a KV failure.
const ERROR_RETRY: Duration = Duration::from_secs(300);

pub(crate) struct Reaper {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Reaper {
    pub(crate) fn new() -> Self {
        Self {
            task: Mutex::new(None),
        }
    }

    /// Replace any scheduled reap with a fresh one.
    pub(crate) fn arm(&self, engine: Arc<MaintenanceEngine>) {
        let handle = tokio::spawn(reap_next(engine));
        let mut guard = self.task.lock().unwrap();
        if let Some(old) = guard.replace(handle) {
            old.abort();
        }
    }
}

async fn reap_next(engine: Arc<MaintenanceEngine>) {
    // Smallest end in the time index is the next window to expire.
    let head = match engine.kv.zrange_withscores(KEY_BY_END, 0, 0).await {
        Ok(head) => head,
        Err(e) => {
            tracing::warn!(error = %e, "reaper index query failed, retrying in 5m");
            tokio::time::sleep(ERROR_RETRY).await;
            engine.poke();
            return;
        }
    };
    let Some((key, end)) = head.into_iter().next() else {
        tracing::debug!("no maintenance windows, reaper idle");
        return;
    };

    let now = Utc::now().timestamp_millis();
    let delay_ms = (end - now).max(MIN_REAPER_GAP_MS) as u64;
    tracing::debug!(key = %key, delay_ms = delay_ms, "reaper armed");
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;

    let Some((user, id)) = parse_window_key(&key) else {
        tracing::warn!(key = %key, "bogus member in maintenance time index, dropping");
        let _ = engine.kv.zrem(KEY_BY_END, &key).await;
        engine.poke();
        return;
    };

    match engine.kv.hgetall(&key).await {
        Ok(fields) if fields.is_empty() => {
            // The window vanished under us; drop leftovers and re-arm.
            let _ = engine.kv.zrem(KEY_BY_END, &key).await;
            let _ = engine.kv.srem(&set_key(user), &id.to_string()).await;
            engine.poke();
        }
        Ok(_) => {
            tracing::info!(user = %user, id = id, end = end, "maintenance window expired");
            // Delete fires the end hook and re-arms the reaper.
            if let Err(e) = engine.delete(user, id).await {
                tracing::warn!(user = %user, id = id, error = %e, "reap delete failed, retrying in 5m");
                tokio::time::sleep(ERROR_RETRY).await;
                engine.poke();
            }
        }
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "reap fetch failed, retrying in 5m");
            tokio::time::sleep(ERROR_RETRY).await;
            engine.poke();
        }
    }
}
