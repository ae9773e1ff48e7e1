use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ProviderError;

/// The canonical credential record held by a provider.
///
/// Records are immutable values once constructed; callers may clone and share
/// them freely. `expiry_date` of `None` means the token never expires (or its
/// validity is unknown) and is never auto-refreshed on time grounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub client_id: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unordered capability labels; insertion order carries no meaning.
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
    /// Seconds of validity granted at issuance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Instant of issuance; `expiry_date = timestamp + expires_in` when both
    /// are present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Only records carrying both a client secret and a refresh token may
    /// drive a refresh.
    pub fn is_refreshable(&self) -> bool {
        self.client_secret.is_some() && self.refresh_token.is_some()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    pub fn has_all_scopes<'a>(&self, scopes: impl IntoIterator<Item = &'a str>) -> bool {
        scopes.into_iter().all(|s| self.has_scope(s))
    }
}

/// The subset an external store must supply; everything beyond `client_id`
/// and `access_token` is optional and hydrated on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadableCredentials {
    pub client_id: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    /// Outer `None` means the field was absent entirely (hydration required);
    /// `Some(None)` is an explicit null meaning "never expires".
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_explicit_null"
    )]
    pub expiry_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl LoadableCredentials {
    pub fn new(client_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            access_token: access_token.into(),
            client_secret: None,
            refresh_token: None,
            scopes: None,
            expiry_date: None,
            expires_in: None,
            timestamp: None,
        }
    }

    /// Whether the record is missing metadata that hydration must fill in.
    pub fn needs_hydration(&self) -> bool {
        self.scopes.is_none() || self.expiry_date.is_none()
    }
}

/// The fully-populated record; only these may drive a refresh. This is also
/// the shape persisted by stores, with field names verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshableCredentials {
    pub client_id: String,
    pub access_token: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<RefreshableCredentials> for Credentials {
    fn from(value: RefreshableCredentials) -> Self {
        Self {
            client_id: value.client_id,
            access_token: value.access_token,
            client_secret: Some(value.client_secret),
            refresh_token: Some(value.refresh_token),
            scopes: value.scopes,
            expiry_date: value.expiry_date,
            expires_in: value.expires_in,
            timestamp: value.timestamp,
        }
    }
}

impl TryFrom<Credentials> for RefreshableCredentials {
    type Error = ProviderError;

    fn try_from(value: Credentials) -> Result<Self, Self::Error> {
        let client_secret = value.client_secret.ok_or_else(|| {
            ProviderError::fatal("credentials are missing a client secret and cannot refresh")
        })?;
        let refresh_token = value.refresh_token.ok_or_else(|| {
            ProviderError::fatal("credentials are missing a refresh token and cannot refresh")
        })?;
        Ok(Self {
            client_id: value.client_id,
            access_token: value.access_token,
            client_secret,
            refresh_token,
            scopes: value.scopes,
            expiry_date: value.expiry_date,
            expires_in: value.expires_in,
            timestamp: value.timestamp,
        })
    }
}

/// Keeps `null` distinguishable from an absent field: a present field always
/// deserializes to `Some(inner)`.
fn deserialize_explicit_null<'de, D>(
    deserializer: D,
) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}
