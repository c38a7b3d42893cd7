//! Client configuration file.
//!
//! # Configuration Format
//!
//! ```toml
//! [server]
//! url = "https://tryout.example.com/api"  # API base URL
//! timeout = 30                  # Request timeout (seconds)
//! connection_timeout = 10       # TCP + TLS handshake timeout (seconds)
//! refresh_timeout = 10          # Token refresh timeout (seconds)
//! http_version = "http1"        # "http1", "http2", "auto"
//!
//! [auth]
//! login = "/auth/login"
//! register = "/auth/register"
//! refresh = "/auth/refresh"
//! logout = "/auth/logout"
//! me = "/me"
//! login_redirect = "/login"     # Where to send the user when the session expires
//!
//! [storage]
//! durable_path = "~/.config/tryout/session.toml"
//!
//! [query]
//! max_retries = 3
//! retry_base_delay_ms = 1000
//! max_retry_delay_ms = 30000
//! stale_time_ms = 0
//! ```

use crate::client::TryoutLinkClientBuilder;
use crate::error::{Result, TryoutLinkError};
use crate::models::HttpVersion;
use crate::query::QueryOptions;
use crate::session::SessionStore;
use crate::storage::{FileTokenStorage, MemoryTokenStorage, SessionStorage};
use crate::timeouts::TryoutLinkTimeouts;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Paths of the endpoints the client itself calls, plus the login entry point
/// of the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiRoutes {
    pub login: String,
    pub register: String,
    pub refresh: String,
    pub logout: String,
    pub me: String,
    /// UI route the user is sent to when the session cannot be refreshed.
    pub login_redirect: String,
}

impl Default for ApiRoutes {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_string(),
            register: "/auth/register".to_string(),
            refresh: "/auth/refresh".to_string(),
            logout: "/auth/logout".to_string(),
            me: "/me".to_string(),
            login_redirect: "/login".to_string(),
        }
    }
}

/// Client configuration loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: ApiRoutes,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// API base URL (e.g., http://localhost:3000/api)
    pub url: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,

    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout: u64,

    /// HTTP version preference: "http1", "http2", "auto"
    #[serde(default = "default_http_version")]
    pub http_version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Session file for "remember me" logins. Defaults to the platform
    /// config directory.
    pub durable_path: Option<String>,

    /// Keep durable tokens in memory only (tests, kiosks).
    #[serde(default)]
    pub in_memory: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,

    /// How long fetched data is served from cache without refetching.
    #[serde(default)]
    pub stale_time_ms: u64,
}

fn default_timeout() -> u64 {
    30
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_refresh_timeout() -> u64 {
    10
}

fn default_http_version() -> String {
    "http1".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_max_retry_delay_ms() -> u64 {
    30000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout: default_timeout(),
            connection_timeout: default_connection_timeout(),
            refresh_timeout: default_refresh_timeout(),
            http_version: default_http_version(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            stale_time_ms: 0,
        }
    }
}

pub fn expand_config_path(path: &Path) -> PathBuf {
    let path_str = path.to_str().unwrap_or_default();
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(rest);
        }
    }
    path.to_path_buf()
}

impl ClientConfig {
    /// Load configuration from file.
    ///
    /// Returns the default configuration if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        let path = expand_config_path(path);
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            TryoutLinkError::ConfigurationError(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| TryoutLinkError::ConfigurationError(format!("TOML parse error: {}", e)))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let path = expand_config_path(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| {
            TryoutLinkError::ConfigurationError(format!("Failed to serialize: {}", e))
        })?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn http_version(&self) -> Result<HttpVersion> {
        self.server
            .http_version
            .parse()
            .map_err(TryoutLinkError::ConfigurationError)
    }

    pub fn timeouts(&self) -> TryoutLinkTimeouts {
        TryoutLinkTimeouts::builder()
            .receive_timeout_secs(self.server.timeout)
            .connection_timeout_secs(self.server.connection_timeout)
            .refresh_timeout_secs(self.server.refresh_timeout)
            .build()
    }

    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            max_retries: self.query.max_retries,
            retry_base_delay: Duration::from_millis(self.query.retry_base_delay_ms),
            max_retry_delay: Duration::from_millis(self.query.max_retry_delay_ms),
            stale_time: Duration::from_millis(self.query.stale_time_ms),
        }
    }

    /// Session storage described by `[storage]`. The tab scope is always
    /// in-memory.
    pub fn session_storage(&self) -> Result<SessionStorage> {
        let tab = Arc::new(MemoryTokenStorage::new());
        if self.storage.in_memory {
            return Ok(SessionStorage::new(Arc::new(MemoryTokenStorage::new()), tab));
        }

        let durable = match &self.storage.durable_path {
            Some(path) => FileTokenStorage::with_path(expand_config_path(Path::new(path)))?,
            None => FileTokenStorage::new()?,
        };
        Ok(SessionStorage::new(Arc::new(durable), tab))
    }

    /// Client builder preloaded with this configuration and a session
    /// restored from the configured storage.
    pub fn to_builder(&self) -> Result<TryoutLinkClientBuilder> {
        let url = self.server.url.clone().ok_or_else(|| {
            TryoutLinkError::ConfigurationError("server.url is required".into())
        })?;

        Ok(TryoutLinkClientBuilder::default()
            .base_url(url)
            .timeouts(self.timeouts())
            .http_version(self.http_version()?)
            .routes(self.auth.clone())
            .session(SessionStore::restore(self.session_storage()?)))
    }
}
