use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::helpers::time;

/// Identity service response to a refresh-token exchange.
///
/// `obtained_at` is stamped by the client when the response arrives; the wire
/// payload only carries relative validity.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds of validity. The identity service omits this for tokens with
    /// unknown or unlimited validity.
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default, rename = "scope")]
    pub scopes: Vec<String>,
    #[serde(skip, default = "time::now")]
    pub obtained_at: DateTime<Utc>,
}

/// Introspection data from the identity service's validate endpoint. Used
/// only during hydration.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub client_id: String,
    pub login: Option<String>,
    pub user_id: Option<String>,
    pub scopes: Vec<String>,
    /// `None` means the token has permanent or unknown validity.
    pub expiry_date: Option<DateTime<Utc>>,
    pub expires_in: Option<u64>,
}

/// Raw validate-endpoint payload.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ValidateResponse {
    pub client_id: String,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl ValidateResponse {
    /// A zero or absent `expires_in` means "never expires".
    pub(crate) fn into_token_info(self, obtained_at: DateTime<Utc>) -> TokenInfo {
        let expires_in = self.expires_in.filter(|&secs| secs > 0);
        TokenInfo {
            client_id: self.client_id,
            login: self.login,
            user_id: self.user_id,
            scopes: self.scopes,
            expiry_date: expires_in.map(|secs| time::expiry_from(obtained_at, secs)),
            expires_in,
        }
    }
}
