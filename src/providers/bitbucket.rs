//! Bitbucket adapter
//!
//! The consent screen and token endpoint live under bitbucket.org
//! (`/site/oauth2/authorize`, `/site/oauth2/access_token` with HTTP
//! basic client authentication); the profile API is a separate host.
//! Email addresses come from the dedicated `/2.0/user/emails` endpoint
//! and are optional: a deployment whose consumer lacks the email scope
//! still authenticates.

use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::{Provider, ProviderAuthError, ProviderSettings, UserRecord};

const SCOPE: &str = "account email";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Bitbucket user profile, as returned by `GET /2.0/user`
///
/// Older workspaces expose `username`, newer ones `nickname`.
#[derive(Debug, Deserialize)]
struct BitbucketUser {
    uuid: String,
    username: Option<String>,
    nickname: Option<String>,
    display_name: Option<String>,
    links: Option<BitbucketLinks>,
}

#[derive(Debug, Deserialize)]
struct BitbucketLinks {
    html: Option<BitbucketLink>,
}

#[derive(Debug, Deserialize)]
struct BitbucketLink {
    href: String,
}

#[derive(Debug, Deserialize)]
struct EmailList {
    values: Vec<EmailEntry>,
}

#[derive(Debug, Deserialize)]
struct EmailEntry {
    email: String,
    #[serde(default)]
    is_primary: bool,
    #[serde(default)]
    is_confirmed: bool,
}

pub(super) fn authorization_url(
    settings: &ProviderSettings,
    state: &str,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&format!(
        "{}/site/oauth2/authorize",
        settings.auth_base_url
    ))?;
    url.query_pairs_mut()
        .append_pair("client_id", &settings.client_id)
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
    let token_url = format!("{}/site/oauth2/access_token", settings.auth_base_url);
    let response = http
        .post(&token_url)
        .basic_auth(&settings.client_id, Some(&settings.client_secret))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", settings.callback_url.as_str()),
        ])
        .send()
        .await
        .map_err(ProviderAuthError::Network)?;

    if !response.status().is_success() {
        return Err(ProviderAuthError::Exchange(response.status().as_u16()));
    }

    let token: TokenResponse = response.json().await.map_err(|e| {
        ProviderAuthError::MalformedResponse(format!("Bitbucket token response: {e}"))
    })?;

    let profile_url = format!("{}/2.0/user", settings.api_base_url);
    let response = http
        .get(&profile_url)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .map_err(ProviderAuthError::Network)?;

    if !response.status().is_success() {
        return Err(ProviderAuthError::MalformedResponse(format!(
            "Bitbucket profile fetch returned status {}",
            response.status()
        )));
    }

    let user: BitbucketUser = response
        .json()
        .await
        .map_err(|e| ProviderAuthError::MalformedResponse(format!("Bitbucket profile: {e}")))?;

    let email = fetch_first_email(http, settings, &token.access_token).await;

    normalize(user, email, token.access_token)
}

/// Fetch the account email list and pick the first usable address.
///
/// Failures here degrade to `None` rather than failing the whole
/// authentication attempt.
async fn fetch_first_email(
    http: &Client,
    settings: &ProviderSettings,
    access_token: &str,
) -> Option<String> {
    let emails_url = format!("{}/2.0/user/emails", settings.api_base_url);
    let response = match http.get(&emails_url).bearer_auth(access_token).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            tracing::debug!(
                status = %response.status(),
                "Bitbucket email lookup unavailable"
            );
            return None;
        }
        Err(error) => {
            tracing::debug!(error = %error, "Bitbucket email lookup failed");
            return None;
        }
    };

    let list: EmailList = response.json().await.ok()?;
    pick_email(list.values)
}

fn pick_email(values: Vec<EmailEntry>) -> Option<String> {
    let primary = values
        .iter()
        .find(|entry| entry.is_primary && entry.is_confirmed);
    let confirmed = values.iter().find(|entry| entry.is_confirmed);
    primary
        .or(confirmed)
        .or(values.first())
        .map(|entry| entry.email.clone())
}

fn normalize(
    user: BitbucketUser,
    email: Option<String>,
    access_token: String,
) -> Result<UserRecord, ProviderAuthError> {
    let username = user.username.or(user.nickname).ok_or_else(|| {
        ProviderAuthError::MalformedResponse("Bitbucket profile has no username".to_string())
    })?;

    let display_name = user
        .display_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| username.clone());

    let profile_url = user
        .links
        .and_then(|links| links.html)
        .map(|link| link.href)
        .unwrap_or_else(|| format!("https://bitbucket.org/{username}/"));

    Ok(UserRecord {
        provider: Provider::Bitbucket,
        id: user.uuid,
        username,
        display_name,
        email,
        profile_url,
        access_token,
    })
}
