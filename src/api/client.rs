use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::api::types::{AccessTokenResponse, TokenInfo, ValidateResponse};
use crate::helpers::time;

pub const DEFAULT_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
pub const DEFAULT_VALIDATE_URL: &str = "https://id.twitch.tv/oauth2/validate";

/// Failures of the identity-service collaborator.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The service answered but the payload violates its contract.
    #[error("{0}")]
    InvalidResponse(String),
}

/// Narrow contract against the identity service. The provider imposes no
/// timeout of its own; timeouts belong to the implementation's HTTP client.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Exchanges a refresh token for a new access token.
    async fn refresh_user_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<AccessTokenResponse, IdentityError>;

    /// Introspects an access token. Used only during hydration.
    async fn get_token_info(
        &self,
        access_token: &str,
        client_id: &str,
    ) -> Result<TokenInfo, IdentityError>;
}

/// `reqwest`-backed identity client against the real Twitch endpoints.
#[derive(Debug, Clone)]
pub struct HttpIdentityClient {
    client: Client,
    token_url: String,
    validate_url: String,
}

impl HttpIdentityClient {
    pub fn new() -> Self {
        Self::with_endpoints(DEFAULT_TOKEN_URL, DEFAULT_VALIDATE_URL)
    }

    pub fn with_endpoints(token_url: impl Into<String>, validate_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token_url: token_url.into(),
            validate_url: validate_url.into(),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

impl Default for HttpIdentityClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityApi for HttpIdentityClient {
    async fn refresh_user_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<AccessTokenResponse, IdentityError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];
        let response = self.client.post(&self.token_url).form(&form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let obtained_at = time::now();
        let body = response.text().await?;
        let mut token: AccessTokenResponse = serde_json::from_str(&body)
            .map_err(|e| IdentityError::InvalidResponse(format!("malformed token payload: {e}")))?;
        token.obtained_at = obtained_at;
        debug!(expires_in = ?token.expires_in, "exchanged refresh token");
        Ok(token)
    }

    async fn get_token_info(
        &self,
        access_token: &str,
        client_id: &str,
    ) -> Result<TokenInfo, IdentityError> {
        let response = self
            .client
            .get(&self.validate_url)
            .header("Authorization", format!("OAuth {access_token}"))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let obtained_at = time::now();
        let body = response.text().await?;
        let raw: ValidateResponse = serde_json::from_str(&body).map_err(|e| {
            IdentityError::InvalidResponse(format!("malformed validate payload: {e}"))
        })?;
        if raw.client_id != client_id {
            return Err(IdentityError::InvalidResponse(format!(
                "token belongs to client '{}', expected '{}'",
                raw.client_id, client_id
            )));
        }
        Ok(raw.into_token_info(obtained_at))
    }
}
