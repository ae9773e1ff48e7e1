//! The refreshing credential provider.
//!
//! Composes the credential cell, hydrator, refresh coordinator, persistence
//! bridge and pruner. All mutable state lives behind one `std::sync::Mutex`
//! that is only ever locked for synchronous sections; shared futures carry
//! results to every waiter.

pub(crate) mod hydrate;
pub(crate) mod persistence;
pub(crate) mod pruner;
pub(crate) mod refresh_map;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::api::IdentityApi;
use crate::config::ProviderSettings;
use crate::credentials::cell::{self, CredentialCell, SharedCredentials};
use crate::credentials::{Credentials, RefreshableCredentials};
use crate::error::ProviderError;
use crate::helpers::time;
use crate::observability::get_metrics;
use crate::provider::refresh_map::{RefreshEntry, RefreshMap, SharedRefresh};
use crate::storage::CredentialStore;

/// Mutable provider state. Guarded by a single mutex; never locked across an
/// await point.
#[derive(Default)]
pub(crate) struct RefreshState {
    pub(crate) refresh_map: RefreshMap,
    pub(crate) next_save_retry: Option<DateTime<Utc>>,
}

struct ProviderShared {
    store: Arc<dyn CredentialStore>,
    api: Arc<dyn IdentityApi>,
    settings: ProviderSettings,
    cell: CredentialCell,
    state: Arc<Mutex<RefreshState>>,
}

/// Serves the current canonical credential set for one application user,
/// refreshing transparently when the access token nears expiry.
///
/// One provider represents one credential set. Records handed out are
/// immutable snapshots; callers may clone and share them freely.
///
/// Construction must happen inside a Tokio runtime: loading and the pruner
/// run as spawned tasks.
pub struct RefreshingProvider {
    shared: Arc<ProviderShared>,
    pruner: JoinHandle<()>,
}

impl RefreshingProvider {
    pub fn new(store: Arc<dyn CredentialStore>, api: Arc<dyn IdentityApi>) -> Self {
        Self::with_settings(store, api, ProviderSettings::default())
    }

    pub fn with_settings(
        store: Arc<dyn CredentialStore>,
        api: Arc<dyn IdentityApi>,
        settings: ProviderSettings,
    ) -> Self {
        let state = Arc::new(Mutex::new(RefreshState::default()));
        // load → hydrate starts on its own task, after this constructor has
        // returned control to the caller
        let initial = cell::spawn_shared(initial_load(
            store.clone(),
            api.clone(),
            state.clone(),
            settings.clone(),
        ));
        let shared = Arc::new(ProviderShared {
            cell: CredentialCell::new(initial),
            state: state.clone(),
            store,
            api,
            settings: settings.clone(),
        });
        let pruner = pruner::spawn(state, settings);
        Self { shared, pruner }
    }

    /// Returns the current credentials, refreshing first when the access
    /// token is within the padding window of its expiry.
    ///
    /// Credentials without an expiry date are returned as-is and never
    /// auto-refreshed. An expired record that cannot refresh fails fatally.
    pub async fn fetch(&self) -> Result<Credentials, ProviderError> {
        let current = self.shared.cell.current().await?;

        let Some(expiry) = current.expiry_date else {
            return Ok(current);
        };

        let now = time::now();
        if !time::needs_refresh(expiry, now, self.shared.settings.refresh_padding_ms) {
            self.shared.maybe_retry_save(&current, now);
            return Ok(current);
        }

        if current.is_refreshable() {
            let refreshed = self.idempotent_refresh(&current.access_token).await?;
            Ok(refreshed.into())
        } else {
            Err(ProviderError::fatal("static credentials have expired"))
        }
    }

    /// Exchanges the superseded `old_access_token` for the record that
    /// replaced (or is replacing) it.
    ///
    /// For any given superseded token there is at most one in-flight exchange
    /// system-wide; concurrent callers naming the same token all receive the
    /// result of the first attempt. A token that is neither current nor in
    /// the refresh history fails fatally, which lets callers holding an
    /// unknown token re-enter through [`fetch`](Self::fetch).
    pub async fn idempotent_refresh(
        &self,
        old_access_token: &str,
    ) -> Result<RefreshableCredentials, ProviderError> {
        match self.shared.begin_or_join(old_access_token) {
            RefreshWait::Settled(record) => Ok(record),
            RefreshWait::Pending(attempt) => attempt.await,
        }
    }

    /// Current credentials without any refresh consideration.
    pub async fn current(&self) -> Result<Credentials, ProviderError> {
        self.shared.cell.current().await
    }

    #[cfg(test)]
    pub(crate) fn refresh_map_len(&self) -> usize {
        self.shared
            .state
            .lock()
            .expect("provider state poisoned")
            .refresh_map
            .len()
    }

    #[cfg(test)]
    pub(crate) fn next_save_retry(&self) -> Option<DateTime<Utc>> {
        self.shared
            .state
            .lock()
            .expect("provider state poisoned")
            .next_save_retry
    }
}

impl Drop for RefreshingProvider {
    fn drop(&mut self) {
        self.pruner.abort();
    }
}

enum RefreshWait {
    Settled(RefreshableCredentials),
    Pending(SharedRefresh),
}

impl ProviderShared {
    /// The check-and-install that makes refreshes single-flight: the state
    /// lock is held from the map lookup until the new attempt is installed,
    /// with no suspension in between.
    fn begin_or_join(&self, old_access_token: &str) -> RefreshWait {
        let mut guard = self.state.lock().expect("provider state poisoned");

        if let Some(entry) = guard.refresh_map.get(old_access_token) {
            return match entry {
                RefreshEntry::Settled(record) => RefreshWait::Settled(record.clone()),
                RefreshEntry::InFlight(attempt) => RefreshWait::Pending(attempt.clone()),
            };
        }

        // the attempt reads the cell as it was before this refresh replaced it
        let prior = self.cell.snapshot();
        let attempt = cell::spawn_shared(run_refresh(
            self.api.clone(),
            self.store.clone(),
            self.state.clone(),
            self.settings.clone(),
            prior.clone(),
            old_access_token.to_owned(),
        ));
        guard
            .refresh_map
            .insert_in_flight(old_access_token.to_owned(), attempt.clone());

        // The cell resolves through the pre-refresh state when the attempt
        // fails, so the next fetch observes the superseded record and may
        // start a new attempt. There is no rollback assignment anywhere.
        let cell_future: SharedCredentials = {
            let attempt = attempt.clone();
            async move {
                match attempt.await {
                    Ok(record) => Ok(record.into()),
                    Err(_) => prior.await,
                }
            }
            .boxed()
            .shared()
        };
        self.cell.replace(cell_future);
        guard.next_save_retry = None;

        RefreshWait::Pending(attempt)
    }

    /// Opportunistic retry of a previously failed save, at most once per
    /// back-off window.
    fn maybe_retry_save(&self, current: &Credentials, now: DateTime<Utc>) {
        let Ok(record) = RefreshableCredentials::try_from(current.clone()) else {
            return;
        };
        let due = {
            let mut guard = self.state.lock().expect("provider state poisoned");
            match guard.next_save_retry {
                Some(at) if now >= at => {
                    // clear the stamp before attempting so concurrent fetches
                    // do not pile on; a failed save re-arms it
                    guard.next_save_retry = None;
                    true
                }
                _ => false,
            }
        };
        if due {
            debug!("retrying credential save");
            persistence::spawn_save(
                self.store.clone(),
                self.state.clone(),
                record,
                self.settings.save_retry_seconds,
            );
        }
    }
}

async fn initial_load(
    store: Arc<dyn CredentialStore>,
    api: Arc<dyn IdentityApi>,
    state: Arc<Mutex<RefreshState>>,
    settings: ProviderSettings,
) -> Result<Credentials, ProviderError> {
    let loadable = store
        .load_credentials()
        .await
        .map_err(|err| ProviderError::Load(Arc::new(err)))?;

    let (credentials, hydrated) = hydrate::hydrate(api.as_ref(), loadable).await?;

    if hydrated {
        if let Ok(record) = RefreshableCredentials::try_from(credentials.clone()) {
            // let the store learn the fully-hydrated shape
            persistence::spawn_save(store, state, record, settings.save_retry_seconds);
        }
    }

    Ok(credentials)
}

async fn run_refresh(
    api: Arc<dyn IdentityApi>,
    store: Arc<dyn CredentialStore>,
    state: Arc<Mutex<RefreshState>>,
    settings: ProviderSettings,
    prior: SharedCredentials,
    old_access_token: String,
) -> Result<RefreshableCredentials, ProviderError> {
    let metrics = get_metrics().await;
    metrics.refresh_attempts.inc();

    match perform_refresh(api.as_ref(), prior, &old_access_token).await {
        Ok(record) => {
            {
                let mut guard = state.lock().expect("provider state poisoned");
                guard.refresh_map.settle(&old_access_token, record.clone());
                metrics
                    .refresh_map_entries
                    .set(guard.refresh_map.len() as i64);
            }
            debug!("access token refreshed; superseded token recorded");
            persistence::spawn_save(store, state, record.clone(), settings.save_retry_seconds);
            Ok(record)
        }
        Err(err) => {
            {
                let mut guard = state.lock().expect("provider state poisoned");
                guard.refresh_map.remove(&old_access_token);
            }
            let reason = if err.is_fatal() { "fatal" } else { "upstream" };
            metrics.refresh_failures.with_label_values(&[reason]).inc();
            error!("token refresh failed: {err}");
            Err(err)
        }
    }
}

async fn perform_refresh(
    api: &dyn IdentityApi,
    prior: SharedCredentials,
    old_access_token: &str,
) -> Result<RefreshableCredentials, ProviderError> {
    let current = prior.await?;
    let current = RefreshableCredentials::try_from(current)?;

    if current.access_token != old_access_token {
        // returning the newer record silently would leak it to a caller who
        // only proved possession of the old token
        return Err(ProviderError::fatal(
            "refresh was called with a stale or unknown access token",
        ));
    }

    let response = api
        .refresh_user_token(
            &current.client_id,
            &current.client_secret,
            &current.refresh_token,
        )
        .await
        .map_err(ProviderError::from_identity)?;

    // a refresh that grants no expiry violates the upstream contract
    let expires_in = response
        .expires_in
        .ok_or_else(|| ProviderError::fatal("refresh response did not include an expiration"))?;
    let obtained_at = response.obtained_at;

    Ok(RefreshableCredentials {
        client_id: current.client_id,
        client_secret: current.client_secret,
        access_token: response.access_token,
        // the service may rotate the refresh token; keep ours when it does not
        refresh_token: response.refresh_token.unwrap_or(current.refresh_token),
        scopes: if response.scopes.is_empty() {
            current.scopes
        } else {
            response.scopes
        },
        expiry_date: Some(time::expiry_from(obtained_at, expires_in)),
        expires_in: Some(expires_in),
        timestamp: Some(obtained_at),
    })
}
