use tracing::debug;

use crate::api::{IdentityApi, IdentityError};
use crate::credentials::{Credentials, LoadableCredentials};
use crate::error::ProviderError;
use crate::observability::get_metrics;

/// Fills missing metadata on a freshly loaded record via token introspection.
///
/// Returns the complete record and whether introspection was needed, so the
/// caller can schedule a save when new data was learned. Records whose store
/// already supplied scopes and an expiry property pass through untouched.
pub(crate) async fn hydrate(
    api: &dyn IdentityApi,
    loadable: LoadableCredentials,
) -> Result<(Credentials, bool), ProviderError> {
    if loadable.client_id.is_empty() || loadable.access_token.is_empty() {
        return Err(ProviderError::fatal("failed to hydrate missing token data"));
    }

    if !loadable.needs_hydration() {
        let credentials = Credentials {
            client_id: loadable.client_id,
            access_token: loadable.access_token,
            client_secret: loadable.client_secret,
            refresh_token: loadable.refresh_token,
            scopes: loadable.scopes.unwrap_or_default(),
            expiry_date: loadable.expiry_date.flatten(),
            expires_in: loadable.expires_in,
            timestamp: loadable.timestamp,
        };
        return Ok((credentials, false));
    }

    let info = api
        .get_token_info(&loadable.access_token, &loadable.client_id)
        .await
        .map_err(|err| match err {
            IdentityError::InvalidResponse(msg) => {
                ProviderError::fatal(format!("failed to hydrate missing token data: {msg}"))
            }
            other => ProviderError::from_identity(other),
        })?;

    debug!(scopes = info.scopes.len(), "hydrated token metadata");
    get_metrics().await.hydrations.inc();

    // An expiry property supplied by the store wins, even an explicit null.
    let expiry_was_absent = loadable.expiry_date.is_none();
    let expiry_date = match loadable.expiry_date {
        Some(stored) => stored,
        None => info.expiry_date,
    };
    let expires_in = if expiry_was_absent {
        loadable.expires_in.or(info.expires_in)
    } else {
        loadable.expires_in
    };
    // Derive the obtainment instant from the introspected expiry so that
    // expiry_date = timestamp + expires_in holds exactly.
    let timestamp = if expiry_was_absent {
        loadable.timestamp.or_else(|| match (info.expiry_date, info.expires_in) {
            (Some(expiry), Some(secs)) => Some(expiry - chrono::Duration::seconds(secs as i64)),
            _ => None,
        })
    } else {
        loadable.timestamp
    };

    let credentials = Credentials {
        client_id: loadable.client_id,
        access_token: loadable.access_token,
        client_secret: loadable.client_secret,
        refresh_token: loadable.refresh_token,
        scopes: loadable.scopes.unwrap_or(info.scopes),
        expiry_date,
        expires_in,
        timestamp,
    };
    Ok((credentials, true))
}
