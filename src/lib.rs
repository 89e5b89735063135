//! Forgegate - OAuth2 sign-in service for source-code hosting providers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Layer (Axum)                       │
//! │  - /auth/{provider}, /oauth/{provider}/callback             │
//! │  - /user-data, /logout, landing/profile pages               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Auth Orchestrator                         │
//! │  - authorization-code flow per attempt                      │
//! │  - session creation on success                              │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                          │
//! ┌──────────────────────────┐  ┌──────────────────────────────┐
//! │   Provider Adapters       │  │        Session Store          │
//! │   - GitLab                │  │   - injected backend          │
//! │   - Bitbucket             │  │   - in-memory (moka)          │
//! └──────────────────────────┘  └──────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `auth`: OAuth orchestration, sessions, HTTP handlers
//! - `providers`: GitLab/Bitbucket adapters and the user record
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod providers;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains
/// shared resources: configuration, session store, provider
/// adapters, and the orchestrator. The provider adapters share
/// one HTTP client.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Session store (in-memory backend)
    pub sessions: Arc<auth::SessionStore>,

    /// Configured provider adapters
    pub providers: Arc<providers::ProviderRegistry>,

    /// Auth orchestrator
    pub auth: Arc<auth::AuthOrchestrator>,
}

/// Timeout for outbound provider requests; an exchange that exceeds it
/// fails the attempt instead of hanging the request.
const PROVIDER_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Build the shared HTTP client
    /// 2. Build the provider registry from configured credentials
    /// 3. Create the session store
    /// 4. Wire the orchestrator
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let http_client = Arc::new(
            reqwest::Client::builder()
                .user_agent(concat!("Forgegate/", env!("CARGO_PKG_VERSION")))
                .timeout(PROVIDER_REQUEST_TIMEOUT)
                .build()
                .map_err(|e| error::AppError::Internal(e.into()))?,
        );

        let providers = Arc::new(providers::ProviderRegistry::from_config(
            &config.providers,
            http_client.clone(),
        ));

        let sessions = Arc::new(auth::SessionStore::in_memory(config.auth.session_max_age));

        let auth = Arc::new(auth::AuthOrchestrator::new(
            providers.clone(),
            sessions.clone(),
        ));

        tracing::info!("Application state initialized");

        Ok(Self {
            config: Arc::new(config),
            sessions,
            providers,
            auth,
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(metrics::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server base URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
