// Hydration: records loaded without scopes or an expiry property are filled
// in via token introspection before the first fetch returns.

use std::sync::Arc;

use crate::tests::common::{settle, token_info, MockIdentityApi, RecordingStore};
use crate::{IdentityError, LoadableCredentials, ProviderError, RefreshingProvider};

fn bare_seed() -> LoadableCredentials {
    let mut seed = LoadableCredentials::new("c", "a0");
    seed.client_secret = Some("s".into());
    seed.refresh_token = Some("r0".into());
    seed
}

#[tokio::test]
async fn missing_scopes_are_hydrated_before_first_fetch() {
    let api = Arc::new(
        MockIdentityApi::new().with_token_info(|_| Ok(token_info(&["chat:read"], Some(3600)))),
    );
    let store = Arc::new(RecordingStore::new(bare_seed()));
    let provider = RefreshingProvider::new(store.clone(), api.clone());

    let credentials = provider.fetch().await.unwrap();
    assert_eq!(credentials.scopes, vec!["chat:read"]);
    assert!(credentials.expiry_date.is_some());
    assert_eq!(api.info_calls(), 1);
    assert_eq!(api.refresh_calls(), 0);

    // the store learns the fully-hydrated shape
    settle().await;
    let attempts = store.save_attempts();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].scopes, vec!["chat:read"]);
}

#[tokio::test]
async fn hydration_happens_once_across_fetches() {
    let api = Arc::new(
        MockIdentityApi::new().with_token_info(|_| Ok(token_info(&["chat:read"], Some(3600)))),
    );
    let store = Arc::new(RecordingStore::new(bare_seed()));
    let provider = RefreshingProvider::new(store, api.clone());

    provider.fetch().await.unwrap();
    provider.fetch().await.unwrap();
    assert_eq!(api.info_calls(), 1);
}

#[tokio::test]
async fn introspection_without_expiry_yields_a_token_that_never_refreshes() {
    let api =
        Arc::new(MockIdentityApi::new().with_token_info(|_| Ok(token_info(&["chat:read"], None))));
    let store = Arc::new(RecordingStore::new(bare_seed()));
    let provider = RefreshingProvider::new(store, api.clone());

    let credentials = provider.fetch().await.unwrap();
    assert_eq!(credentials.expiry_date, None);

    provider.fetch().await.unwrap();
    assert_eq!(api.refresh_calls(), 0);
}

#[tokio::test]
async fn stored_expiry_property_skips_introspection_of_expiry() {
    // scopes present and expiry explicitly null: nothing to hydrate
    let mut seed = bare_seed();
    seed.scopes = Some(vec!["chat:read".into()]);
    seed.expiry_date = Some(None);

    let api = Arc::new(MockIdentityApi::new());
    let store = Arc::new(RecordingStore::new(seed));
    let provider = RefreshingProvider::new(store.clone(), api.clone());

    let credentials = provider.fetch().await.unwrap();
    assert_eq!(credentials.expiry_date, None);
    assert_eq!(api.info_calls(), 0);

    settle().await;
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn malformed_introspection_fails_hydration_fatally() {
    let api = Arc::new(
        MockIdentityApi::new()
            .with_token_info(|_| Err(IdentityError::InvalidResponse("scopes was not a list".into()))),
    );
    let store = Arc::new(RecordingStore::new(bare_seed()));
    let provider = RefreshingProvider::new(store, api);

    let err = provider.fetch().await.unwrap_err();
    assert!(err.is_fatal());
    assert!(err.to_string().contains("failed to hydrate"));
}

#[tokio::test]
async fn unreachable_identity_service_is_a_transient_failure() {
    let api = Arc::new(MockIdentityApi::new().with_token_info(|_| {
        Err(IdentityError::Status {
            status: 502,
            body: "bad gateway".into(),
        })
    }));
    let store = Arc::new(RecordingStore::new(bare_seed()));
    let provider = RefreshingProvider::new(store, api);

    let err = provider.fetch().await.unwrap_err();
    assert!(matches!(err, ProviderError::Upstream(_)));
}
