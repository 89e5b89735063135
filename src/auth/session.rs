//! Session records and cookie signing
//!
//! The browser cookie carries only the session identifier, signed with
//! HMAC-SHA256 so a forged or tampered identifier never reaches the
//! store. The user record itself stays server-side.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::providers::UserRecord;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";
/// Name of the short-lived OAuth state cookie
pub const STATE_COOKIE: &str = "oauth_state";

/// Server-side session record
///
/// Holds exactly one authenticated user. Expiry is absolute from
/// creation, not sliding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session identifier, also the store key
    pub id: String,
    pub user: UserRecord,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user: UserRecord, max_age: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: random_token(),
            user,
            created_at: now,
            expires_at: now + max_age,
        }
    }

    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Generate a cryptographically random URL-safe token
///
/// Used for session identifiers and OAuth state values.
pub fn random_token() -> String {
    use base64::{Engine as _, engine::general_purpose};
    use rand::RngCore;

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Sign a session identifier for transport in a cookie
///
/// Cookie value format: `{id}.{base64(hmac_sha256(id))}`
pub fn sign_session_id(id: &str, secret: &str) -> Result<String, AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Config(format!("session secret unusable as HMAC key: {e}")))?;
    mac.update(id.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    Ok(format!("{}.{}", id, signature_b64))
}

/// Verify a signed cookie value and return the session identifier
///
/// # Errors
/// Returns `Unauthorized` if the value is malformed or the signature
/// does not verify; callers cannot distinguish this from a missing
/// session.
pub fn verify_session_cookie(value: &str, secret: &str) -> Result<String, AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let (id, signature_b64) = value.split_once('.').ok_or(AppError::Unauthorized)?;

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Config(format!("session secret unusable as HMAC key: {e}")))?;
    mac.update(id.as_bytes());

    let expected_signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Unauthorized)?;

    mac.verify_slice(&expected_signature)
        .map_err(|_| AppError::Unauthorized)?;

    Ok(id.to_string())
}
