//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)
//!
//! The flat environment names used by existing deployments
//! (`GITLAB_CLIENT_ID`, `SESSION_SECRET`, `PORT`, ...) are recognized
//! alongside the `FORGEGATE__*` nested form.

use serde::Deserialize;
use std::net::IpAddr;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub providers: ProvidersConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 5000)
    pub port: u16,
    /// Public domain (e.g., "auth.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the service
    ///
    /// # Returns
    /// Full URL like "https://auth.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Session and cookie configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session signing secret (32+ bytes)
    pub session_secret: String,
    /// Session lifetime in seconds, absolute from creation
    /// (default: 86400 = 24 hours)
    pub session_max_age: i64,
    /// OAuth state cookie lifetime in seconds (default: 600)
    pub state_max_age: i64,
}

/// Per-provider OAuth2 credentials
///
/// A provider with no configured credentials is simply absent from
/// the registry; its routes answer 404.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
    /// Redirect URI registered with the provider,
    /// e.g. "http://localhost:5000/oauth/gitlab/callback"
    pub callback_url: String,
    /// Authorization/token host override (tests point this at a mock)
    pub base_url: Option<String>,
    /// Profile API host override, for providers that serve the API
    /// from a different host than the consent screen
    pub api_url: Option<String>,
}

/// Provider credential sections
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub gitlab: Option<ProviderCredentials>,
    #[serde(default)]
    pub bitbucket: Option<ProviderCredentials>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (FORGEGATE_*)
    /// 5. Flat legacy environment names (SESSION_SECRET, PORT,
    ///    {PROVIDER}_CLIENT_ID/_CLIENT_SECRET/_CALLBACK_URL)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let env = |name: &str| std::env::var(name).ok();

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("server.domain", "localhost")?
            .set_default("server.protocol", "http")?
            .set_default("auth.session_max_age", 86_400)?
            .set_default("auth.state_max_age", 600)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (FORGEGATE_*)
            .add_source(
                Environment::with_prefix("FORGEGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            // Flat names recognized for compatibility with existing deployments
            .set_override_option("auth.session_secret", env("SESSION_SECRET"))?
            .set_override_option("server.port", env("PORT"))?
            .set_override_option("providers.gitlab.client_id", env("GITLAB_CLIENT_ID"))?
            .set_override_option("providers.gitlab.client_secret", env("GITLAB_CLIENT_SECRET"))?
            .set_override_option("providers.gitlab.callback_url", env("GITLAB_CALLBACK_URL"))?
            .set_override_option("providers.bitbucket.client_id", env("BITBUCKET_CLIENT_ID"))?
            .set_override_option(
                "providers.bitbucket.client_secret",
                env("BITBUCKET_CLIENT_SECRET"),
            )?
            .set_override_option(
                "providers.bitbucket.callback_url",
                env("BITBUCKET_CALLBACK_URL"),
            )?
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.as_bytes().len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        if self.auth.state_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.state_max_age must be greater than 0".to_string(),
            ));
        }

        if self.providers.gitlab.is_none() && self.providers.bitbucket.is_none() {
            return Err(crate::error::AppError::Config(
                "at least one provider must be configured".to_string(),
            ));
        }

        if !self.should_use_secure_cookies() {
            let host = normalized_server_host(&self.server.domain);
            tracing::warn!(
                host = %host,
                protocol = %self.server.protocol,
                "Using insecure session cookies for local development"
            );
        } else if !self.server.protocol.eq_ignore_ascii_case("https") {
            return Err(crate::error::AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
