use std::sync::{Arc, Mutex};

use chrono::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::credentials::RefreshableCredentials;
use crate::helpers::time;
use crate::observability::get_metrics;
use crate::provider::RefreshState;
use crate::storage::CredentialStore;

/// Fires a save without blocking the caller.
///
/// Credentials are returned to callers whether or not the save lands. A
/// failure is logged once and stamps `next_save_retry`, so a later `fetch`
/// retries opportunistically, at most once per back-off window. Success
/// clears the stamp.
pub(crate) fn spawn_save(
    store: Arc<dyn CredentialStore>,
    state: Arc<Mutex<RefreshState>>,
    credentials: RefreshableCredentials,
    retry_after_seconds: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match store.save_credentials(&credentials).await {
            Ok(()) => {
                debug!("credentials saved");
                let mut guard = state.lock().expect("provider state poisoned");
                guard.next_save_retry = None;
            }
            Err(err) => {
                warn!("failed to save credentials, will retry on a later fetch: {err:#}");
                get_metrics().await.save_failures.inc();
                let mut guard = state.lock().expect("provider state poisoned");
                guard.next_save_retry =
                    Some(time::now() + Duration::seconds(retry_after_seconds as i64));
            }
        }
    })
}
