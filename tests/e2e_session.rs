//! E2E tests for session lookup, /user-data, and logout

mod common;

use common::{TestServer, no_redirect_client};
use forgegate::auth::session::sign_session_id;
use forgegate::providers::{Provider, UserRecord};

fn test_user() -> UserRecord {
    UserRecord {
        provider: Provider::Gitlab,
        id: "42".to_string(),
        username: "jdoe".to_string(),
        display_name: "Jane Doe".to_string(),
        email: Some("jane@example.com".to_string()),
        profile_url: "https://gitlab.com/jdoe".to_string(),
        access_token: "super-secret-token".to_string(),
    }
}

/// Create a session directly in the store and return a valid cookie
/// header value for it.
async fn signed_in_cookie(server: &TestServer) -> String {
    let session = server
        .state
        .sessions
        .create(test_user())
        .await
        .expect("session created");
    let value = sign_session_id(&session.id, server.session_secret()).expect("cookie signed");
    format!("session={value}")
}

#[tokio::test]
async fn user_data_requires_a_session() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/user-data"))
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.expect("json body");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn user_data_returns_record_without_access_token() {
    let server = TestServer::new().await;
    let cookie = signed_in_cookie(&server).await;

    let response = server
        .client
        .get(server.url("/user-data"))
        .header("Cookie", cookie)
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("response body");
    let user: serde_json::Value = serde_json::from_str(&body).expect("json body");

    assert_eq!(user["provider"], "gitlab");
    assert_eq!(user["id"], "42");
    assert_eq!(user["displayName"], "Jane Doe");
    assert_eq!(user["username"], "jdoe");
    assert_eq!(user["email"], "jane@example.com");
    assert_eq!(user["profileUrl"], "https://gitlab.com/jdoe");
    assert!(!body.contains("accessToken"));
    assert!(!body.contains("super-secret-token"));
}

#[tokio::test]
async fn tampered_session_cookie_is_unauthorized() {
    let server = TestServer::new().await;
    let cookie = signed_in_cookie(&server).await;

    // Flip a character inside the signed identifier
    let mut tampered = cookie.clone().into_bytes();
    let flip_at = "session=".len();
    tampered[flip_at] = if tampered[flip_at] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(tampered).unwrap();

    let response = server
        .client
        .get(server.url("/user-data"))
        .header("Cookie", tampered)
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn unsigned_session_id_is_unauthorized() {
    let server = TestServer::new().await;
    let session = server
        .state
        .sessions
        .create(test_user())
        .await
        .expect("session created");

    // A raw identifier without its signature never reaches the store
    let response = server
        .client
        .get(server.url("/user-data"))
        .header("Cookie", format!("session={}", session.id))
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn logout_destroys_the_session() {
    let server = TestServer::new().await;
    let client = no_redirect_client();
    let cookie = signed_in_cookie(&server).await;

    let response = client
        .get(server.url("/logout"))
        .header("Cookie", cookie.clone())
        .send()
        .await
        .expect("request succeeds");

    assert!(response.status().is_redirection());
    assert_eq!(
        response
            .headers()
            .get("location")
            .and_then(|value| value.to_str().ok()),
        Some("/")
    );

    // The cookie is cleared...
    let cleared: Vec<String> = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok().map(ToString::to_string))
        .collect();
    assert!(
        cleared.iter().any(|value| value.starts_with("session=")),
        "expected session removal cookie, got: {cleared:?}"
    );

    // ...and the session is gone server-side even if the cookie is replayed
    let response = server
        .client
        .get(server.url("/user-data"))
        .header("Cookie", cookie)
        .send()
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn logout_without_session_still_redirects_home() {
    let server = TestServer::new().await;
    let client = no_redirect_client();

    let response = client
        .get(server.url("/logout"))
        .send()
        .await
        .expect("request succeeds");

    assert!(response.status().is_redirection());
}

#[tokio::test]
async fn profile_redirects_home_when_signed_out() {
    let server = TestServer::new().await;
    let client = no_redirect_client();

    let response = client
        .get(server.url("/profile"))
        .send()
        .await
        .expect("request succeeds");

    assert!(response.status().is_redirection());
    assert_eq!(
        response
            .headers()
            .get("location")
            .and_then(|value| value.to_str().ok()),
        Some("/")
    );
}

#[tokio::test]
async fn profile_renders_when_signed_in() {
    let server = TestServer::new().await;
    let cookie = signed_in_cookie(&server).await;

    let response = server
        .client
        .get(server.url("/profile"))
        .header("Cookie", cookie)
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("response body");
    assert!(body.contains("/user-data"));
}

#[tokio::test]
async fn landing_page_links_to_providers() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/"))
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("response body");
    assert!(body.contains("/auth/gitlab"));
    assert!(body.contains("/auth/bitbucket"));
}

#[tokio::test]
async fn health_endpoint_responds() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.expect("body"), "OK");
}
