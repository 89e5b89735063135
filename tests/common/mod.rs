//! Common test utilities for E2E tests

use axum::{
    Json, Router,
    extract::Form,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use forgegate::{AppState, config};
use std::collections::HashMap;
use tokio::net::TcpListener;

/// Authorization code both mock token endpoints accept
pub const GOOD_CODE: &str = "good-code";
/// Access token the mock GitLab issues
pub const GITLAB_TOKEN: &str = "gitlab-access-token";
/// Access token the mock Bitbucket issues
pub const BITBUCKET_TOKEN: &str = "bitbucket-access-token";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a test server whose providers point at the public hosts.
    ///
    /// Suitable for everything that never follows the consent redirect.
    pub async fn new() -> Self {
        Self::start(test_config(None)).await
    }

    /// Create a test server whose providers point at a mock provider.
    pub async fn with_provider_base(base_url: &str) -> Self {
        Self::start(test_config(Some(base_url))).await
    }

    async fn start(config: config::AppConfig) -> Self {
        // Initialize app state
        let state = AppState::new(config).unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        // Build router
        let app = forgegate::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    pub fn session_secret(&self) -> &str {
        &self.state.config.auth.session_secret
    }
}

/// Build a test configuration; provider hosts default to the public
/// endpoints unless a mock base URL is given.
pub fn test_config(provider_base: Option<&str>) -> config::AppConfig {
    let credentials = |client_id: &str, callback: &str| config::ProviderCredentials {
        client_id: client_id.to_string(),
        client_secret: format!("{client_id}-secret"),
        callback_url: format!("http://localhost:5000{callback}"),
        base_url: provider_base.map(str::to_string),
        api_url: provider_base.map(str::to_string),
    };

    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            domain: "localhost".to_string(),
            protocol: "http".to_string(),
        },
        auth: config::AuthConfig {
            session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
            session_max_age: 86_400,
            state_max_age: 600,
        },
        providers: config::ProvidersConfig {
            gitlab: Some(credentials("test-gitlab-client-id", "/oauth/gitlab/callback")),
            bitbucket: Some(credentials(
                "test-bitbucket-client-id",
                "/oauth/bitbucket/callback",
            )),
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// HTTP client that does not follow redirects, for asserting on
/// Location headers and Set-Cookie values.
pub fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .expect("failed to build no-redirect client")
}

/// Extract a non-empty cookie value from the Set-Cookie headers of a
/// response.
pub fn response_cookie(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|raw| {
            let (pair, _) = raw.split_once(';').unwrap_or((raw, ""));
            let (cookie_name, cookie_value) = pair.split_once('=')?;
            (cookie_name.trim() == name && !cookie_value.is_empty())
                .then(|| cookie_value.to_string())
        })
}

/// Extract the `state` query parameter from a consent-screen redirect.
pub fn state_from_location(location: &str) -> String {
    let url = url::Url::parse(location).expect("location is a URL");
    url.query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .expect("state parameter present")
}

// =============================================================================
// Mock provider
// =============================================================================

/// In-process provider standing in for GitLab and Bitbucket
///
/// Serves both token endpoints and both profile APIs so the full
/// exchange path runs without touching the network.
pub struct MockProvider {
    pub base_url: String,
}

impl MockProvider {
    pub async fn spawn() -> Self {
        let app = Router::new()
            .route("/oauth/token", post(gitlab_token))
            .route("/api/v4/user", get(gitlab_user))
            .route("/site/oauth2/access_token", post(bitbucket_token))
            .route("/2.0/user", get(bitbucket_user))
            .route("/2.0/user/emails", get(bitbucket_emails));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url }
    }
}

fn bearer_matches(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {token}"))
}

async fn gitlab_token(
    Form(params): Form<HashMap<String, String>>,
) -> (StatusCode, Json<serde_json::Value>) {
    if params.get("code").map(String::as_str) == Some(GOOD_CODE) {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "access_token": GITLAB_TOKEN,
                "token_type": "Bearer",
                "scope": "read_user",
            })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "invalid_grant" })),
        )
    }
}

async fn gitlab_user(headers: HeaderMap) -> (StatusCode, Json<serde_json::Value>) {
    if !bearer_matches(&headers, GITLAB_TOKEN) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "message": "401 Unauthorized" })),
        );
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": 42,
            "username": "jdoe",
            "name": "Jane Doe",
            "email": "jane@example.com",
            "public_email": null,
            "web_url": "https://gitlab.com/jdoe",
        })),
    )
}

async fn bitbucket_token(
    Form(params): Form<HashMap<String, String>>,
) -> (StatusCode, Json<serde_json::Value>) {
    if params.get("code").map(String::as_str) == Some(GOOD_CODE) {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "access_token": BITBUCKET_TOKEN,
                "token_type": "bearer",
                "scopes": "account email",
            })),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "The authorization code is invalid or expired.",
            })),
        )
    }
}

async fn bitbucket_user(headers: HeaderMap) -> (StatusCode, Json<serde_json::Value>) {
    if !bearer_matches(&headers, BITBUCKET_TOKEN) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": { "message": "Access token expired." } })),
        );
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "uuid": "{7f0003a4-0000-4000-8000-000000000000}",
            "username": "bbuser",
            "display_name": "Bee User",
            "links": { "html": { "href": "https://bitbucket.org/bbuser/" } },
        })),
    )
}

async fn bitbucket_emails(headers: HeaderMap) -> (StatusCode, Json<serde_json::Value>) {
    if !bearer_matches(&headers, BITBUCKET_TOKEN) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": { "message": "Access token expired." } })),
        );
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "values": [
                { "email": "old@example.com", "is_primary": false, "is_confirmed": true },
                { "email": "bee@example.com", "is_primary": true, "is_confirmed": true },
            ],
        })),
    )
}
