//! Authentication extractors
//!
//! Handlers that require an authenticated caller take [`CurrentUser`];
//! page handlers that merely branch on authentication take
//! [`MaybeUser`]. Both read the signed session cookie and resolve the
//! record through the session store.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use axum_extra::extract::CookieJar;

use super::session::{SESSION_COOKIE, Session, verify_session_cookie};
use crate::AppState;
use crate::error::AppError;

fn extract_session_cookie(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_owned())
}

async fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<Session, AppError> {
    let cookie = extract_session_cookie(headers).ok_or(AppError::Unauthorized)?;
    let id = verify_session_cookie(&cookie, &state.config.auth.session_secret)?;
    state
        .sessions
        .get(&id)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// Extractor for the current authenticated session
///
/// Rejects with 401 when the cookie is missing, tampered with, or no
/// live session backs it.
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(session): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", session.user.username)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>().cloned() {
            return Ok(CurrentUser(session));
        }

        let state = AppState::from_ref(state);
        let session = authenticate(&parts.headers, &state).await?;
        parts.extensions.insert(session.clone());

        Ok(CurrentUser(session))
    }
}

/// Optional session extractor
///
/// Returns None if not authenticated, instead of error.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Session>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>().cloned() {
            return Ok(MaybeUser(Some(session)));
        }

        let app_state = AppState::from_ref(state);
        let session = authenticate(&parts.headers, &app_state).await.ok();

        if let Some(session) = &session {
            parts.extensions.insert(session.clone());
        }

        Ok(MaybeUser(session))
    }
}
