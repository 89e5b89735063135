//! Authentication HTTP surface
//!
//! Routes:
//! - GET / - Landing page with sign-in links
//! - GET /auth/{provider} - Redirect to provider consent screen
//! - GET /oauth/{provider}/callback - OAuth callback
//! - GET /profile - Profile page (redirects home when signed out)
//! - GET /user-data - Authenticated user record as JSON
//! - GET /logout - Destroy session

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;

use super::middleware::{CurrentUser, MaybeUser};
use super::orchestrator::CallbackQuery;
use super::session::{SESSION_COOKIE, STATE_COOKIE, sign_session_id, verify_session_cookie};
use crate::AppState;
use crate::error::AppError;
use crate::providers::{Provider, UserRecord};

/// Create authentication router
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/", get(landing_page))
        .route("/profile", get(profile_page))
        .route("/auth/:provider", get(begin_auth))
        .route("/oauth/:provider/callback", get(oauth_callback))
        .route("/user-data", get(user_data))
        .route("/logout", get(logout))
}

// =============================================================================
// Pages
// =============================================================================

/// GET /
///
/// Landing page with one sign-in link per provider. Also the redirect
/// target for failed authentication attempts.
async fn landing_page() -> impl IntoResponse {
    Html(
        r#"
        <!DOCTYPE html>
        <html>
        <head><title>Sign in - Forgegate</title></head>
        <body>
            <h1>Forgegate</h1>
            <p>Sign in with your source-hosting account</p>
            <a href="/auth/gitlab">Sign in with GitLab</a><br>
            <a href="/auth/bitbucket">Sign in with Bitbucket</a>
        </body>
        </html>
    "#,
    )
}

/// GET /profile
///
/// Redirects home when unauthenticated. The page itself is static and
/// pulls the user record from /user-data, so no profile field is ever
/// interpolated into markup server-side.
async fn profile_page(MaybeUser(session): MaybeUser) -> Response {
    if session.is_none() {
        return Redirect::to("/").into_response();
    }

    Html(
        r#"
        <!DOCTYPE html>
        <html>
        <head><title>Profile - Forgegate</title></head>
        <body>
            <h1>Signed in</h1>
            <dl>
                <dt>Provider</dt><dd id="provider"></dd>
                <dt>Name</dt><dd id="displayName"></dd>
                <dt>Username</dt><dd id="username"></dd>
                <dt>Email</dt><dd id="email"></dd>
                <dt>Profile</dt><dd id="profileUrl"></dd>
            </dl>
            <a href="/logout">Sign out</a>
            <script>
                fetch('/user-data', { credentials: 'same-origin' })
                    .then((response) => response.json())
                    .then((user) => {
                        for (const field of ['provider', 'displayName', 'username', 'email', 'profileUrl']) {
                            document.getElementById(field).textContent = user[field] ?? '';
                        }
                    });
            </script>
        </body>
        </html>
    "#,
    )
    .into_response()
}

// =============================================================================
// OAuth flow
// =============================================================================

/// GET /auth/{provider}
///
/// Starts an authentication attempt: stores the state token in a
/// short-lived cookie and redirects the browser to the provider
/// consent screen.
async fn begin_auth(
    State(state): State<AppState>,
    Path(provider): Path<Provider>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    let redirect = state.auth.initiate(provider)?;

    let cookie = build_cookie(
        STATE_COOKIE,
        redirect.state.clone(),
        state.config.auth.state_max_age,
        state.config.should_use_secure_cookies(),
    );

    Ok((jar.add(cookie), Redirect::to(redirect.url.as_str())))
}

/// GET /oauth/{provider}/callback
///
/// Completes the attempt. On success the browser gets the signed
/// session cookie and lands on /profile; any provider-side failure
/// sends it back to the landing page with no session created.
async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<Provider>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    let expected_state = jar
        .get(STATE_COOKIE)
        .map(|cookie| cookie.value().to_owned());
    let jar = jar.remove(removal_cookie(STATE_COOKIE));

    match state
        .auth
        .handle_callback(provider, &query, expected_state.as_deref())
        .await
    {
        Ok(session) => {
            let value = sign_session_id(&session.id, &state.config.auth.session_secret)?;
            let cookie = build_cookie(
                SESSION_COOKIE,
                value,
                state.config.auth.session_max_age,
                state.config.should_use_secure_cookies(),
            );
            Ok((jar.add(cookie), Redirect::to("/profile")))
        }
        // Terminal for this attempt; the user may re-initiate from the
        // landing page.
        Err(AppError::ProviderAuth(_)) => Ok((jar, Redirect::to("/"))),
        Err(other) => Err(other),
    }
}

/// GET /user-data
///
/// Returns the authenticated user record as JSON, or a 401 error body.
/// The access token is never part of the response.
async fn user_data(CurrentUser(session): CurrentUser) -> Json<UserData> {
    Json(UserData::from(&session.user))
}

/// GET /logout
///
/// Destroys the caller's session (idempotent) and clears the cookie.
async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(id) = verify_session_cookie(cookie.value(), &state.config.auth.session_secret) {
            state.sessions.destroy(&id).await?;
        }
    }

    Ok((jar.remove(removal_cookie(SESSION_COOKIE)), Redirect::to("/")))
}

// =============================================================================
// Helpers
// =============================================================================

/// External representation of a user record
///
/// Field names match what the front-end consumes; `accessToken` has no
/// counterpart here by construction.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserData {
    provider: Provider,
    id: String,
    display_name: String,
    username: String,
    email: Option<String>,
    profile_url: String,
}

impl From<&UserRecord> for UserData {
    fn from(user: &UserRecord) -> Self {
        Self {
            provider: user.provider,
            id: user.id.clone(),
            display_name: user.display_name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            profile_url: user.profile_url.clone(),
        }
    }
}

fn build_cookie(name: &'static str, value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, "")).path("/").build()
}
