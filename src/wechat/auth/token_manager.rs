use std::{sync::Arc, time::Duration};

use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, info};

use super::TokenProvider;
use crate::config::AppCredentials;

/// Caches the token issued by `Provider` and refreshes it once it has expired.
///
/// The store stays locked for the whole refresh, so callers that arrive while a
/// refresh is in flight wait for it and reuse its result.
pub struct TokenManager<Provider>
where
    Provider: TokenProvider,
{
    provider: Provider,
    store: Arc<CredentialStore>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error<RenewalError> {
    #[error("token provider: {0}")]
    Provider(#[source] RenewalError),
}

/// A token together with the window it is usable in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub issued_at: Instant,
    pub valid_for: Duration,
}

impl Credential {
    pub fn from_expiring_token<T: super::ExpiringToken>(token: T) -> Self {
        Self {
            token: token.access_token().to_owned(),
            issued_at: token.issued_at(),
            valid_for: token.valid_for(),
        }
    }

    pub fn is_valid_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.issued_at) < self.valid_for
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Instant::now())
    }
}

impl super::Token for Credential {
    fn access_token(&self) -> &str {
        &self.token
    }
}

/// Single slot holding the process' credential. Entries are only ever replaced whole.
#[derive(Debug, Default)]
pub struct CredentialStore {
    slot: Mutex<Option<Credential>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored credential, whether or not it is still valid.
    pub async fn get(&self) -> Option<Credential> {
        self.slot.lock().await.clone()
    }

    pub async fn replace(&self, credential: Credential) {
        self.slot.lock().await.replace(credential);
    }

    pub async fn invalidate(&self) {
        if self.slot.lock().await.take().is_some() {
            info!(message = "Cached token invalidated");
        }
    }
}

impl<Provider> TokenManager<Provider>
where
    Provider: TokenProvider,
    <Provider as TokenProvider>::Token: super::ExpiringToken,
{
    pub fn new(provider: Provider) -> Self {
        Self::with_store(provider, Arc::new(CredentialStore::new()))
    }

    pub fn with_store(provider: Provider, store: Arc<CredentialStore>) -> Self {
        Self { provider, store }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    async fn fetch_new_token(
        &self,
        app: &AppCredentials,
    ) -> Result<Credential, Error<Provider::Error>> {
        let token = self
            .provider
            .get_auth_token(app)
            .await
            .map_err(Error::Provider)?;
        let credential = Credential::from_expiring_token(token);
        Ok(credential)
    }

    pub async fn get_token(
        &self,
        app: &AppCredentials,
    ) -> Result<Credential, Error<Provider::Error>> {
        let mut cached = self.store.slot.lock().await;

        if let Some(credential) = &*cached {
            if credential.is_valid() {
                debug!(message = "Using preexisting token", token_issued_at = ?credential.issued_at);
                return Ok(credential.clone());
            }
            debug!(message = "Existing token expired, refreshing", token_issued_at = ?credential.issued_at);
        }

        info!(
            message = "No active token found, about to get a new one",
            token_is_stale = cached.is_some(),
        );

        let credential = self.fetch_new_token(app).await?;
        cached.replace(credential.clone());

        debug!(message = "Got new token", token_valid_for = ?credential.valid_for);

        Ok(credential)
    }
}

#[async_trait::async_trait]
impl<Provider> super::TokenProvider for TokenManager<Provider>
where
    Provider: TokenProvider,
    <Provider as TokenProvider>::Token: super::ExpiringToken,
{
    type Token = Credential;
    type Error = Error<Provider::Error>;

    async fn get_auth_token(&self, app: &AppCredentials) -> Result<Self::Token, Self::Error> {
        let token = self.get_token(app).await?;
        Ok(token)
    }

    async fn invalidate(&self) {
        self.store.invalidate().await;
    }
}
