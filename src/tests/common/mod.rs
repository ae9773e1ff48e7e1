// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::api::{AccessTokenResponse, IdentityApi, IdentityError, TokenInfo};
use crate::credentials::{LoadableCredentials, RefreshableCredentials};
use crate::helpers::time;
use crate::storage::CredentialStore;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn token_response(
    access_token: &str,
    refresh_token: &str,
    expires_in: u64,
    scopes: &[&str],
) -> AccessTokenResponse {
    AccessTokenResponse {
        access_token: access_token.into(),
        refresh_token: Some(refresh_token.into()),
        expires_in: Some(expires_in),
        scopes: scopes.iter().map(|s| s.to_string()).collect(),
        obtained_at: time::now(),
    }
}

pub fn token_info(scopes: &[&str], expires_in: Option<u64>) -> TokenInfo {
    let now = time::now();
    TokenInfo {
        client_id: "c".into(),
        login: Some("someuser".into()),
        user_id: Some("12345".into()),
        scopes: scopes.iter().map(|s| s.to_string()).collect(),
        expiry_date: expires_in.map(|secs| time::expiry_from(now, secs)),
        expires_in,
    }
}

type RefreshFn = dyn Fn(usize) -> Result<AccessTokenResponse, IdentityError> + Send + Sync;
type InfoFn = dyn Fn(usize) -> Result<TokenInfo, IdentityError> + Send + Sync;

/// Programmable identity service double. Closures receive the zero-based
/// call index so tests can script fail-then-succeed sequences.
pub struct MockIdentityApi {
    refresh_calls: AtomicUsize,
    info_calls: AtomicUsize,
    refresh_delay: Option<Duration>,
    refresh_fn: Box<RefreshFn>,
    info_fn: Box<InfoFn>,
}

impl MockIdentityApi {
    pub fn new() -> Self {
        Self {
            refresh_calls: AtomicUsize::new(0),
            info_calls: AtomicUsize::new(0),
            refresh_delay: None,
            refresh_fn: Box::new(|n| {
                Ok(token_response(
                    &format!("a{}", n + 1),
                    &format!("r{}", n + 1),
                    3600,
                    &["chat:read", "chat:edit"],
                ))
            }),
            info_fn: Box::new(|_| {
                Err(IdentityError::InvalidResponse(
                    "no token info configured".into(),
                ))
            }),
        }
    }

    pub fn with_refresh(
        mut self,
        f: impl Fn(usize) -> Result<AccessTokenResponse, IdentityError> + Send + Sync + 'static,
    ) -> Self {
        self.refresh_fn = Box::new(f);
        self
    }

    /// Keeps every refresh in flight for `delay` before answering.
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    pub fn with_token_info(
        mut self,
        f: impl Fn(usize) -> Result<TokenInfo, IdentityError> + Send + Sync + 'static,
    ) -> Self {
        self.info_fn = Box::new(f);
        self
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityApi for MockIdentityApi {
    async fn refresh_user_token(
        &self,
        _client_id: &str,
        _client_secret: &str,
        _refresh_token: &str,
    ) -> Result<AccessTokenResponse, IdentityError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        (self.refresh_fn)(n)
    }

    async fn get_token_info(
        &self,
        _access_token: &str,
        _client_id: &str,
    ) -> Result<TokenInfo, IdentityError> {
        let n = self.info_calls.fetch_add(1, Ordering::SeqCst);
        (self.info_fn)(n)
    }
}

/// Store double that records every save attempt and can be told to fail the
/// next N of them.
pub struct RecordingStore {
    seeded: LoadableCredentials,
    saves: Mutex<Vec<RefreshableCredentials>>,
    failures_left: AtomicUsize,
}

impl RecordingStore {
    pub fn new(seeded: LoadableCredentials) -> Self {
        Self {
            seeded,
            saves: Mutex::new(Vec::new()),
            failures_left: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_saves(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Every save attempt, in order, including failed ones.
    pub fn save_attempts(&self) -> Vec<RefreshableCredentials> {
        self.saves.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }
}

#[async_trait]
impl CredentialStore for RecordingStore {
    async fn load_credentials(&self) -> Result<LoadableCredentials> {
        Ok(self.seeded.clone())
    }

    async fn save_credentials(&self, credentials: &RefreshableCredentials) -> Result<()> {
        self.saves.lock().unwrap().push(credentials.clone());
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            anyhow::bail!("simulated save failure");
        }
        Ok(())
    }
}

/// Fully-populated loadable record (skips hydration) expiring at `expiry`.
pub fn refreshable_seed(expiry: Option<DateTime<Utc>>) -> LoadableCredentials {
    let mut seed = LoadableCredentials::new("c", "a0");
    seed.client_secret = Some("s".into());
    seed.refresh_token = Some("r0".into());
    seed.scopes = Some(vec!["chat:read".into()]);
    seed.expiry_date = Some(expiry);
    seed
}

pub fn expired_seed() -> LoadableCredentials {
    refreshable_seed(Some(time::now() - chrono::Duration::seconds(5)))
}

pub fn fresh_seed() -> LoadableCredentials {
    refreshable_seed(Some(time::now() + chrono::Duration::hours(1)))
}

/// Gives fire-and-forget tasks (saves, settles) a moment to land.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
