//! Authorize using the client credential grant of the authorization endpoint.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;
use tracing::warn;

use crate::{
    config::AppCredentials,
    wechat::utils::{check_status, ApiStatus, ServerError},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error("reqwest: {0}")]
    Reqwest(#[source] reqwest::Error),
    #[error("server: {0}")]
    Server(#[from] ServerError),
}

/// The request URL carries the app secret, so it never reaches the error text.
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Reqwest(err.without_url())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("failed to get access token: {errmsg} ({errcode})")]
    Api { errcode: i64, errmsg: String },
    #[error("failed to get access token: empty token")]
    EmptyToken,
}

pub struct ClientCredentials {
    pub client: reqwest::Client,
    pub token_url: String,
}

impl ClientCredentials {
    pub fn new(client: reqwest::Client, api_base: &str) -> Self {
        Self {
            client,
            token_url: format!("{}/cgi-bin/token", api_base.trim_end_matches('/')),
        }
    }

    /// Perform the client credential flow.
    pub async fn perform(&self, app: &AppCredentials) -> Result<AuthResponse, Error> {
        let params = &[
            ("grant_type", "client_credential"),
            ("appid", app.app_id.as_str()),
            ("secret", app.app_secret.as_str()),
        ];

        let req = self.client.get(&self.token_url).query(params).build()?;

        let res = self.client.execute(req).await?;
        check_status(&res)?;
        let auth_response: AuthResponse = res.json().await?;

        if let Some((errcode, errmsg)) = auth_response.status.failure() {
            return Err(AuthorizationError::Api { errcode, errmsg }.into());
        }
        if auth_response.access_token.is_empty() {
            return Err(AuthorizationError::EmptyToken.into());
        }
        Ok(auth_response)
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    /// The credential the media endpoint expects as `access_token`.
    #[serde(default)]
    access_token: String,
    /// Lifetime of the token in seconds.
    #[serde(default)]
    expires_in: u64,
    #[serde(flatten)]
    status: ApiStatus,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub access_token: String,
    pub issued_at: Instant,
    pub valid_for: Duration,
}

impl From<AuthResponse> for Token {
    fn from(auth: AuthResponse) -> Self {
        let AuthResponse {
            access_token,
            expires_in,
            ..
        } = auth;
        Self {
            access_token,
            issued_at: Instant::now(),
            valid_for: Duration::from_millis(expires_in.saturating_mul(1000)),
        }
    }
}

#[async_trait::async_trait]
impl super::TokenProvider for ClientCredentials {
    type Token = Token;
    type Error = Error;

    async fn get_auth_token(&self, app: &AppCredentials) -> Result<Self::Token, Self::Error> {
        let auth_response = self.perform(app).await.map_err(|err| {
            warn!(message = "Failed to get access token", app_id = %app.app_id, error = %err);
            err
        })?;
        let token = auth_response.into();
        Ok(token)
    }
}

impl super::Token for Token {
    fn access_token(&self) -> &str {
        self.access_token.as_str()
    }
}

impl super::ExpiringToken for Token {
    fn issued_at(&self) -> Instant {
        self.issued_at
    }

    fn valid_for(&self) -> Duration {
        self.valid_for
    }
}
