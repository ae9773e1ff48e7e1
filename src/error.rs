use std::sync::Arc;

use thiserror::Error;

use crate::api::IdentityError;

/// Errors surfaced by a credential provider.
///
/// Persistence failures are absorbed by the provider (logged and retried on a
/// later fetch) and therefore have no variant here.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Configuration or contract violation. Not recoverable by the provider.
    #[error("fatal provider error: {0}")]
    Fatal(String),

    /// The identity service failed transiently; a later attempt may succeed.
    #[error("identity service request failed: {0}")]
    Upstream(Arc<IdentityError>),

    /// The initial `load_credentials` call failed. The provider is unusable.
    #[error("failed to load credentials: {0}")]
    Load(Arc<anyhow::Error>),
}

impl ProviderError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    /// Classify an identity-service error: malformed responses are contract
    /// violations, everything else is a transient upstream failure.
    pub(crate) fn from_identity(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidResponse(msg) => {
                Self::Fatal(format!("identity service response is invalid: {msg}"))
            }
            other => Self::Upstream(Arc::new(other)),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

impl From<IdentityError> for ProviderError {
    fn from(err: IdentityError) -> Self {
        Self::from_identity(err)
    }
}
