//! Provider strategy adapters
//!
//! Each supported source-hosting provider is a variant of [`Provider`];
//! the two adapter operations (building the consent-screen redirect and
//! exchanging an authorization code for a normalized [`UserRecord`]) are
//! dispatched by tag rather than through a trait object.

mod bitbucket;
mod gitlab;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::{ProviderCredentials, ProvidersConfig};
use crate::error::AppError;

/// Supported OAuth2 providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gitlab,
    Bitbucket,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gitlab => "gitlab",
            Provider::Bitbucket => "bitbucket",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized authenticated identity
///
/// `provider` + `id` uniquely identify a record. `display_name` falls
/// back to `username` when the provider profile carries no name, so it
/// is never empty for a profile with a username. `access_token` is held
/// for provider API calls and is never serialized into an HTTP response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub provider: Provider,
    /// Provider-scoped unique identifier
    pub id: String,
    pub username: String,
    pub display_name: String,
    /// First available email from the provider profile
    pub email: Option<String>,
    /// Provider's canonical profile link
    pub profile_url: String,
    pub access_token: String,
}

/// Failures of the provider-facing authentication exchange
///
/// None of these are retried; a failed attempt is terminal and the
/// user must re-initiate the flow.
#[derive(Debug, Error)]
pub enum ProviderAuthError {
    /// User denied consent, or the provider returned an error
    /// instead of an authorization code
    #[error("authorization denied: {0}")]
    Denied(String),

    /// State parameter missing or not matching the value issued
    /// when the flow was initiated
    #[error("state parameter missing or mismatched")]
    StateMismatch,

    /// Provider rejected the authorization code (invalid or expired)
    #[error("provider rejected authorization code (status {0})")]
    Exchange(u16),

    /// Network failure reaching the provider, including timeouts
    #[error("network failure contacting provider: {0}")]
    Network(reqwest::Error),

    /// Provider returned a response the adapter could not interpret
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for ProviderAuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderAuthError::MalformedResponse(err.to_string())
        } else {
            ProviderAuthError::Network(err)
        }
    }
}

/// Resolved endpoints and credentials for one provider
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
    /// Host serving the consent screen and token endpoint
    pub auth_base_url: String,
    /// Host serving the profile API
    pub api_base_url: String,
}

impl ProviderSettings {
    fn from_credentials(provider: Provider, creds: &ProviderCredentials) -> Self {
        let (default_auth, default_api) = match provider {
            Provider::Gitlab => ("https://gitlab.com", "https://gitlab.com"),
            Provider::Bitbucket => ("https://bitbucket.org", "https://api.bitbucket.org"),
        };

        let auth_base_url = creds
            .base_url
            .clone()
            .unwrap_or_else(|| default_auth.to_string());
        // A single overridden host serves both roles unless api_url says otherwise.
        let api_base_url = creds
            .api_url
            .clone()
            .or_else(|| creds.base_url.clone())
            .unwrap_or_else(|| default_api.to_string());

        Self {
            client_id: creds.client_id.clone(),
            client_secret: creds.client_secret.clone(),
            callback_url: creds.callback_url.clone(),
            auth_base_url: auth_base_url.trim_end_matches('/').to_string(),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Adapter for one configured provider
///
/// Holds the provider tag, resolved settings, and the shared HTTP
/// client. Operations dispatch on the tag.
pub struct ProviderClient {
    provider: Provider,
    settings: ProviderSettings,
    http: Arc<reqwest::Client>,
}

impl ProviderClient {
    pub fn new(provider: Provider, settings: ProviderSettings, http: Arc<reqwest::Client>) -> Self {
        Self {
            provider,
            settings,
            http,
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Build the provider consent-screen URL
    ///
    /// Embeds `client_id`, `redirect_uri`, `response_type=code`, the
    /// provider's required scopes, and the CSRF `state` token.
    pub fn authorization_redirect(&self, state: &str) -> Result<Url, AppError> {
        let url = match self.provider {
            Provider::Gitlab => gitlab::authorization_url(&self.settings, state),
            Provider::Bitbucket => bitbucket::authorization_url(&self.settings, state),
        };
        url.map_err(|e| {
            AppError::Config(format!(
                "invalid {} authorization endpoint: {}",
                self.provider, e
            ))
        })
    }

    /// Exchange an authorization code for a normalized user record
    ///
    /// # Steps
    /// 1. POST the code to the provider token endpoint
    /// 2. Fetch the profile with the returned bearer token
    /// 3. Normalize into a [`UserRecord`]
    ///
    /// # Errors
    /// Returns [`ProviderAuthError`] for a rejected code, a network
    /// failure or timeout, or a response that cannot be interpreted.
    pub async fn exchange_code(&self, code: &str) -> Result<UserRecord, ProviderAuthError> {
        let timer = crate::metrics::PROVIDER_REQUEST_DURATION_SECONDS
            .with_label_values(&[self.provider.as_str()])
            .start_timer();

        let result = match self.provider {
            Provider::Gitlab => gitlab::exchange_code(&self.http, &self.settings, code).await,
            Provider::Bitbucket => bitbucket::exchange_code(&self.http, &self.settings, code).await,
        };

        timer.observe_duration();
        result
    }
}

/// Registry of configured provider adapters
///
/// Providers without credentials are absent; their routes answer 404.
pub struct ProviderRegistry {
    gitlab: Option<ProviderClient>,
    bitbucket: Option<ProviderClient>,
}

impl ProviderRegistry {
    pub fn from_config(config: &ProvidersConfig, http: Arc<reqwest::Client>) -> Self {
        let build = |provider: Provider, creds: &Option<ProviderCredentials>| {
            creds.as_ref().map(|creds| {
                ProviderClient::new(
                    provider,
                    ProviderSettings::from_credentials(provider, creds),
                    http.clone(),
                )
            })
        };

        Self {
            gitlab: build(Provider::Gitlab, &config.gitlab),
            bitbucket: build(Provider::Bitbucket, &config.bitbucket),
        }
    }

    pub fn get(&self, provider: Provider) -> Result<&ProviderClient, AppError> {
        let client = match provider {
            Provider::Gitlab => self.gitlab.as_ref(),
            Provider::Bitbucket => self.bitbucket.as_ref(),
        };
        client.ok_or(AppError::ProviderNotConfigured(provider))
    }
}
