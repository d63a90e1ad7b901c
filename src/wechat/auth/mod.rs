//! Authorization logic.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::AppCredentials;

pub mod client_credentials;
pub mod token_manager;

#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    type Token: Token;
    type Error: Send + Sync;

    async fn get_auth_token(&self, app: &AppCredentials) -> Result<Self::Token, Self::Error>;

    /// Forget any cached token so the next call goes to the authorization endpoint.
    async fn invalidate(&self) {}
}

pub trait Token: Send {
    fn access_token(&self) -> &str;
}

pub trait ExpiringToken: Token {
    fn issued_at(&self) -> Instant;
    fn valid_for(&self) -> Duration;
}
