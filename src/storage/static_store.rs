use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::credentials::{LoadableCredentials, RefreshableCredentials};
use crate::storage::CredentialStore;

/// A store for fixed credentials that can never refresh.
///
/// The constructor deliberately takes no client secret or refresh token, so
/// the loaded record is never refreshable and a fetch past expiry fails
/// fatally instead of attempting a refresh.
pub struct StaticCredentialStore {
    seeded: LoadableCredentials,
}

impl StaticCredentialStore {
    pub fn new(client_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            seeded: LoadableCredentials::new(client_id, access_token),
        }
    }

    /// Pre-sets scopes so hydration can be skipped.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.seeded.scopes = Some(scopes);
        self
    }

    /// Pre-sets the expiry; `None` means the token never expires.
    pub fn with_expiry(mut self, expiry_date: Option<DateTime<Utc>>) -> Self {
        self.seeded.expiry_date = Some(expiry_date);
        self
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn load_credentials(&self) -> Result<LoadableCredentials> {
        Ok(self.seeded.clone())
    }

    async fn save_credentials(&self, _credentials: &RefreshableCredentials) -> Result<()> {
        bail!("static credential store cannot persist credentials")
    }
}
