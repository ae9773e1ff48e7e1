//! Persistence backends for credential records.
//!
//! Implementers supply `load_credentials` (called exactly once, at provider
//! construction) and `save_credentials` (fired after refreshes and
//! hydration). Save failures are absorbed by the provider and retried on a
//! later fetch.

pub mod file;
pub mod memory;
pub mod static_store;

use anyhow::Result;
use async_trait::async_trait;

use crate::credentials::{LoadableCredentials, RefreshableCredentials};

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;
pub use static_store::StaticCredentialStore;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load_credentials(&self) -> Result<LoadableCredentials>;

    async fn save_credentials(&self, credentials: &RefreshableCredentials) -> Result<()>;
}
