use anyhow::Result;
use async_trait::async_trait;

use crate::credentials::{LoadableCredentials, RefreshableCredentials};
use crate::storage::CredentialStore;

/// In-memory refreshable store: loads the constructor-supplied record, save
/// is a no-op. The provider's own state is the source of truth.
pub struct MemoryCredentialStore {
    seeded: LoadableCredentials,
}

impl MemoryCredentialStore {
    pub fn new(seeded: LoadableCredentials) -> Self {
        Self { seeded }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load_credentials(&self) -> Result<LoadableCredentials> {
        Ok(self.seeded.clone())
    }

    async fn save_credentials(&self, _credentials: &RefreshableCredentials) -> Result<()> {
        Ok(())
    }
}
