//! GitLab adapter
//!
//! Consent screen and token endpoint live under the GitLab host
//! (`/oauth/authorize`, `/oauth/token`); the profile comes from
//! `/api/v4/user` with the bearer token. The `read_user` scope is
//! sufficient for the profile fields we normalize.

use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::{Provider, ProviderAuthError, ProviderSettings, UserRecord};

const SCOPE: &str = "read_user";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// GitLab user profile, as returned by `GET /api/v4/user`
#[derive(Debug, Deserialize)]
struct GitLabUser {
    id: u64,
    username: String,
    name: Option<String>,
    email: Option<String>,
    public_email: Option<String>,
    web_url: String,
}

pub(super) fn authorization_url(
    settings: &ProviderSettings,
    state: &str,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&format!("{}/oauth/authorize", settings.auth_base_url))?;
    url.query_pairs_mut()
        .append_pair("client_id", &settings.client_id)
        .append_pair("redirect_uri", &settings.callback_url)
        .append_pair("response_type", "code")
        .append_pair("scope", SCOPE)
        .append_pair("state", state);
    Ok(url)
}

pub(super) async fn exchange_code(
    http: &Client,
    settings: &ProviderSettings,
    code: &str,
) -> Result<UserRecord, ProviderAuthError> {
    let token_url = format!("{}/oauth/token", settings.auth_base_url);
    let response = http
        .post(&token_url)
        .form(&[
            ("client_id", settings.client_id.as_str()),
            ("client_secret", settings.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", settings.callback_url.as_str()),
        ])
        .send()
        .await
        .map_err(ProviderAuthError::Network)?;

    if !response.status().is_success() {
        return Err(ProviderAuthError::Exchange(response.status().as_u16()));
    }

    let token: TokenResponse = response.json().await.map_err(|e| {
        ProviderAuthError::MalformedResponse(format!("GitLab token response: {e}"))
    })?;

    let profile_url = format!("{}/api/v4/user", settings.api_base_url);
    let response = http
        .get(&profile_url)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .map_err(ProviderAuthError::Network)?;

    if !response.status().is_success() {
        return Err(ProviderAuthError::MalformedResponse(format!(
            "GitLab profile fetch returned status {}",
            response.status()
        )));
    }

    let user: GitLabUser = response
        .json()
        .await
        .map_err(|e| ProviderAuthError::MalformedResponse(format!("GitLab profile: {e}")))?;

    Ok(normalize(user, token.access_token))
}

fn normalize(user: GitLabUser, access_token: String) -> UserRecord {
    let display_name = user
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| user.username.clone());
    let email = user
        .email
        .or(user.public_email)
        .filter(|email| !email.is_empty());

    UserRecord {
        provider: Provider::Gitlab,
        id: user.id.to_string(),
        username: user.username,
        display_name,
        email,
        profile_url: user.web_url,
        access_token,
    }
}
