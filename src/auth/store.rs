//! Session store
//!
//! An explicit store over an injected [`SessionBackend`], never a
//! module-level singleton. The in-memory backend is a moka cache whose
//! TTL matches the absolute session lifetime; `get` additionally checks
//! `expires_at` so a backend without TTL support still honors expiry.
//!
//! All mutation is keyed by session identifier, so concurrent requests
//! for different sessions never contend on each other's records.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use super::session::Session;
use crate::error::AppError;
use crate::providers::UserRecord;

/// Storage seam for session records
///
/// Implementations must be safe for concurrent access from multiple
/// in-flight requests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn put(&self, session: Session) -> Result<(), AppError>;
    async fn get(&self, id: &str) -> Result<Option<Session>, AppError>;
    async fn remove(&self, id: &str) -> Result<(), AppError>;
}

/// In-memory backend backed by a concurrent cache
///
/// Volatile: sessions do not survive a restart.
pub struct MemoryBackend {
    sessions: moka::future::Cache<String, Session>,
}

impl MemoryBackend {
    /// Sessions the memory backend will hold before evicting
    const MAX_SESSIONS: u64 = 100_000;

    pub fn new(max_age: Duration) -> Self {
        let ttl = max_age
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(86_400));
        let sessions = moka::future::Cache::builder()
            .max_capacity(Self::MAX_SESSIONS)
            .time_to_live(ttl)
            .build();

        Self { sessions }
    }
}

#[async_trait]
impl SessionBackend for MemoryBackend {
    async fn put(&self, session: Session) -> Result<(), AppError> {
        self.sessions.insert(session.id.clone(), session).await;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>, AppError> {
        Ok(self.sessions.get(id).await)
    }

    async fn remove(&self, id: &str) -> Result<(), AppError> {
        self.sessions.invalidate(id).await;
        Ok(())
    }
}

/// Session store
///
/// Owns identifier generation and expiry policy; storage itself is
/// delegated to the injected backend.
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    max_age: Duration,
}

impl SessionStore {
    pub fn in_memory(max_age_secs: i64) -> Self {
        let max_age = Duration::seconds(max_age_secs);
        Self::with_backend(Arc::new(MemoryBackend::new(max_age)), max_age)
    }

    pub fn with_backend(backend: Arc<dyn SessionBackend>, max_age: Duration) -> Self {
        Self { backend, max_age }
    }

    /// Create a session for an authenticated user
    ///
    /// Generates a fresh cryptographically random identifier; one call,
    /// one session.
    pub async fn create(&self, user: UserRecord) -> Result<Session, AppError> {
        let session = Session::new(user, self.max_age);
        self.backend
            .put(session.clone())
            .await
            .map_err(store_error)?;

        crate::metrics::SESSIONS_CREATED_TOTAL
            .with_label_values(&[session.user.provider.as_str()])
            .inc();
        crate::metrics::SESSIONS_ACTIVE.inc();

        Ok(session)
    }

    /// Look up a live session
    ///
    /// Returns `None` for unknown identifiers and for sessions past
    /// their absolute expiry.
    pub async fn get(&self, id: &str) -> Result<Option<Session>, AppError> {
        let session = self.backend.get(id).await.map_err(store_error)?;
        Ok(session.filter(|session| !session.is_expired()))
    }

    /// Destroy a session; idempotent
    pub async fn destroy(&self, id: &str) -> Result<(), AppError> {
        let existed = self.backend.get(id).await.map_err(store_error)?.is_some();
        self.backend.remove(id).await.map_err(store_error)?;

        if existed {
            crate::metrics::SESSIONS_DESTROYED_TOTAL
                .with_label_values(&["logout"])
                .inc();
            crate::metrics::SESSIONS_ACTIVE.dec();
        }

        Ok(())
    }
}

/// Collapse backend failures into the storage error variant so no
/// backend detail shapes the HTTP response.
fn store_error(err: AppError) -> AppError {
    match err {
        AppError::SessionStore(_) => err,
        other => AppError::SessionStore(other.to_string()),
    }
}
