use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::credentials::{LoadableCredentials, RefreshableCredentials};
use crate::storage::CredentialStore;

/// JSON-file-backed store.
///
/// Writes go to a sibling `.tmp` file first and are renamed into place, so a
/// crash mid-save never leaves a truncated document. No cross-process
/// locking: concurrent providers on the same path are undefined.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load_credentials(&self) -> Result<LoadableCredentials> {
        let raw = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading credentials from {}", self.path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("decoding credentials in {}", self.path.display()))
    }

    async fn save_credentials(&self, credentials: &RefreshableCredentials) -> Result<()> {
        let data = serde_json::to_string_pretty(credentials)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, data.as_bytes())
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        debug!(path = %self.path.display(), "credentials persisted");
        Ok(())
    }
}
