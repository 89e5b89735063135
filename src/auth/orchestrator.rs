//! Auth orchestrator
//!
//! Drives the redirect-based OAuth2 dance: authorization request,
//! provider redirect, callback, token exchange, profile fetch, session
//! creation. Each attempt moves through [`AttemptPhase`]; failure is
//! terminal for that attempt and the user must re-initiate.

use std::sync::Arc;

use serde::Deserialize;
use url::Url;

use super::session::{Session, random_token};
use super::store::SessionStore;
use crate::error::AppError;
use crate::metrics::AUTH_ATTEMPTS_TOTAL;
use crate::providers::{Provider, ProviderAuthError, ProviderRegistry};

/// Phase of an authentication attempt, recorded in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    RedirectedToProvider,
    CallbackReceived,
    Authenticated,
    Failed,
}

/// Query parameters a provider sends to the callback endpoint
///
/// Everything is optional: a denial arrives as `error` with no `code`.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Result of initiating an attempt: where to send the browser, and the
/// state token to round-trip in a short-lived cookie.
pub struct AuthRedirect {
    pub url: Url,
    pub state: String,
}

/// Orchestrates authentication attempts against the provider adapters
/// and the session store.
pub struct AuthOrchestrator {
    providers: Arc<ProviderRegistry>,
    sessions: Arc<SessionStore>,
}

impl AuthOrchestrator {
    pub fn new(providers: Arc<ProviderRegistry>, sessions: Arc<SessionStore>) -> Self {
        Self {
            providers,
            sessions,
        }
    }

    /// Begin an authentication attempt
    ///
    /// Returns the provider consent-screen redirect with a fresh state
    /// token embedded.
    pub fn initiate(&self, provider: Provider) -> Result<AuthRedirect, AppError> {
        let client = self.providers.get(provider)?;
        let state = random_token();
        let url = client.authorization_redirect(&state)?;

        tracing::info!(
            provider = %provider,
            phase = ?AttemptPhase::RedirectedToProvider,
            "Redirecting to provider consent screen"
        );

        Ok(AuthRedirect { url, state })
    }

    /// Complete an authentication attempt from the provider callback
    ///
    /// # Steps
    /// 1. Verify the round-tripped state token
    /// 2. Reject provider-signaled denials and missing codes
    /// 3. Exchange the code through the provider adapter
    /// 4. Create exactly one session for the resulting user record
    ///
    /// # Errors
    /// `ProviderAuth` for any failure of the exchange itself (the
    /// router turns this into a redirect to the landing page);
    /// `SessionStore` if the store cannot persist the session.
    pub async fn handle_callback(
        &self,
        provider: Provider,
        query: &CallbackQuery,
        expected_state: Option<&str>,
    ) -> Result<Session, AppError> {
        tracing::debug!(
            provider = %provider,
            phase = ?AttemptPhase::CallbackReceived,
            "Handling provider callback"
        );

        let client = self.providers.get(provider)?;

        let code = match self.validate_callback(query, expected_state) {
            Ok(code) => code,
            Err(error) => return Err(self.fail(provider, error)),
        };

        let user = match client.exchange_code(code).await {
            Ok(user) => user,
            Err(error) => return Err(self.fail(provider, error)),
        };

        debug_assert_eq!(user.provider, provider);

        let session = self.sessions.create(user).await?;

        AUTH_ATTEMPTS_TOTAL
            .with_label_values(&[provider.as_str(), "success"])
            .inc();
        tracing::info!(
            provider = %provider,
            username = %session.user.username,
            phase = ?AttemptPhase::Authenticated,
            "Authentication succeeded"
        );

        Ok(session)
    }

    fn validate_callback<'q>(
        &self,
        query: &'q CallbackQuery,
        expected_state: Option<&str>,
    ) -> Result<&'q str, ProviderAuthError> {
        if let Some(error) = &query.error {
            let detail = query
                .error_description
                .clone()
                .unwrap_or_else(|| error.clone());
            return Err(ProviderAuthError::Denied(detail));
        }

        match (expected_state, query.state.as_deref()) {
            (Some(expected), Some(received)) if expected == received => {}
            _ => return Err(ProviderAuthError::StateMismatch),
        }

        query
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| ProviderAuthError::Denied("callback carried no code".to_string()))
    }

    fn fail(&self, provider: Provider, error: ProviderAuthError) -> AppError {
        AUTH_ATTEMPTS_TOTAL
            .with_label_values(&[provider.as_str(), "failure"])
            .inc();
        tracing::warn!(
            provider = %provider,
            error = %error,
            phase = ?AttemptPhase::Failed,
            "Authentication attempt failed"
        );
        AppError::ProviderAuth(error)
    }
}
