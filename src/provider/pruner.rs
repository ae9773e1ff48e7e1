use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::config::ProviderSettings;
use crate::observability::get_metrics;
use crate::provider::RefreshState;

/// Periodic eviction of settled refresh-map entries past their grace window.
///
/// The task is bound to the provider: `RefreshingProvider::drop` aborts it,
/// and a spawned task does not keep the runtime alive once the owner exits.
/// In-flight attempts are never evicted.
pub(crate) fn spawn(
    state: Arc<Mutex<RefreshState>>,
    settings: ProviderSettings,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(settings.prune_interval_seconds.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick fires immediately; skip it so a fresh provider does
        // not scan an empty map
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let (removed, remaining) = {
                let mut guard = state.lock().expect("provider state poisoned");
                let removed = guard
                    .refresh_map
                    .prune_expired(crate::helpers::time::now(), settings.expiry_age_seconds);
                (removed, guard.refresh_map.len())
            };
            get_metrics()
                .await
                .refresh_map_entries
                .set(remaining as i64);
            if removed > 0 {
                debug!(removed, remaining, "pruned settled refresh entries");
            }
        }
    })
}
