use std::future::Future;
use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use crate::credentials::types::Credentials;
use crate::error::ProviderError;

/// A cloneable handle on an asynchronously-settled provider value.
pub type SharedResult<T> = Shared<BoxFuture<'static, Result<T, ProviderError>>>;

/// The cell's view of the current credentials.
pub type SharedCredentials = SharedResult<Credentials>;

/// Runs `fut` on its own task and returns a cloneable future for its result.
///
/// The task makes progress regardless of awaiters, so cancelling one caller
/// never cancels work other callers depend on.
pub(crate) fn spawn_shared<T, F>(fut: F) -> SharedResult<T>
where
    T: Clone + Send + 'static,
    F: Future<Output = Result<T, ProviderError>> + Send + 'static,
{
    let handle = tokio::spawn(fut);
    async move {
        match handle.await {
            Ok(result) => result,
            Err(join_err) => Err(ProviderError::fatal(format!(
                "credential task did not complete: {join_err}"
            ))),
        }
    }
    .boxed()
    .shared()
}

/// Single-holder container for the current canonical credentials.
///
/// Writers install a new future before it settles; concurrent readers observe
/// either the old settled value or the new pending one, never a torn state.
pub struct CredentialCell {
    current: Mutex<SharedCredentials>,
}

impl CredentialCell {
    pub(crate) fn new(initial: SharedCredentials) -> Self {
        Self {
            current: Mutex::new(initial),
        }
    }

    /// Clones the current handle. The lock is released before any await.
    pub(crate) fn snapshot(&self) -> SharedCredentials {
        self.current.lock().expect("credential cell poisoned").clone()
    }

    /// Atomically installs `next` as the current value, returning the prior
    /// handle so a refresh attempt can resolve through the pre-refresh state.
    pub(crate) fn replace(&self, next: SharedCredentials) -> SharedCredentials {
        let mut guard = self.current.lock().expect("credential cell poisoned");
        debug!("replacing current credential future");
        std::mem::replace(&mut *guard, next)
    }

    /// Awaits the current credentials. Initial-load failures propagate to
    /// every reader; the cell never retries the load on its own.
    pub async fn current(&self) -> Result<Credentials, ProviderError> {
        self.snapshot().await
    }
}
