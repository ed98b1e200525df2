use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

/// A bearer token scoped to one API origin. The poller holds it read-only
/// for the duration of a run and asks the provider for a fresh one when the
/// feed rejects it.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    pub origin: Url,
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential source unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credential(&self, origin: &Url) -> Result<Credential, CredentialError>;
}

/// Provider backed by a pre-issued token from configuration.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: String) -> Self {
        Self { token }
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenProvider {
    async fn credential(&self, origin: &Url) -> Result<Credential, CredentialError> {
        Ok(Credential {
            token: self.token.clone(),
            origin: origin.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
struct AuthorizeRequest<'a> {
    api_base_url: &'a str,
    user_email: &'a str,
    user_pass: &'a str,
}

/// Shape of the auth service's authorize response; expiry metadata is
/// ignored, the poller refreshes on rejection instead of on a clock.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Provider backed by the external token-issuance service.
///
/// The service owns the OAuth dance with the instance; this side only posts
/// account credentials to `/auth/mastodon/authorize` and gets a bearer token
/// back.
pub struct AuthServiceProvider {
    client: reqwest::Client,
    base_url: Url,
    user_email: String,
    user_pass: String,
}

impl AuthServiceProvider {
    pub fn new(base_url: Url, user_email: String, user_pass: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            user_email,
            user_pass,
        }
    }
}

#[async_trait]
impl CredentialProvider for AuthServiceProvider {
    async fn credential(&self, origin: &Url) -> Result<Credential, CredentialError> {
        let url = self
            .base_url
            .join("auth/mastodon/authorize")
            .map_err(|e| CredentialError::Unavailable(format!("bad auth service url: {e}")))?;

        let resp = self
            .client
            .post(url)
            .json(&AuthorizeRequest {
                api_base_url: origin.as_str(),
                user_email: &self.user_email,
                user_pass: &self.user_pass,
            })
            .send()
            .await
            .map_err(|e| CredentialError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CredentialError::Unavailable(format!(
                "auth service returned {status}: {body}"
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| CredentialError::Unavailable(format!("bad token response: {e}")))?;
        tracing::info!(origin = %origin, "Obtained bearer token from auth service");

        Ok(Credential {
            token: token.token,
            origin: origin.clone(),
        })
    }
}
