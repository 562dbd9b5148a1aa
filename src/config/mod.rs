//! Configuration management
//!
//! This module handles loading and parsing configuration for Mouth Metrics.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Remote users API configuration
    #[serde(default)]
    pub users_api: UsersApiConfig,
    /// Identity provider configuration
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL used for canonical links, sitemap and email action links
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Optional directory whose templates replace the embedded ones
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: default_base_url(),
            templates_dir: None,
        }
    }
}

impl ServerConfig {
    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_base_url() -> String {
    "https://mouth-metrics-d696a.web.app".to_string()
}

/// Remote users API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersApiConfig {
    /// Base URL of the users service
    #[serde(default = "default_users_api_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// How the service identity token is obtained
    #[serde(default)]
    pub token_mode: TokenMode,
    /// Fixed bearer token (token_mode = static)
    #[serde(default)]
    pub static_token: Option<String>,
    /// Metadata server root (token_mode = metadata)
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,
    /// How long a fetched identity token is reused, in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,
}

impl Default for UsersApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_users_api_url(),
            timeout_secs: default_timeout_secs(),
            token_mode: TokenMode::default(),
            static_token: None,
            metadata_url: default_metadata_url(),
            token_ttl_seconds: default_token_ttl(),
        }
    }
}

fn default_users_api_url() -> String {
    "https://users-164502969077.asia-southeast1.run.app".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_metadata_url() -> String {
    "http://metadata.google.internal".to_string()
}

fn default_token_ttl() -> u64 {
    3000
}

/// Source of the identity token attached to users API requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenMode {
    /// Google metadata server (default, for Cloud Run style deployments)
    #[default]
    Metadata,
    /// Token taken from configuration
    Static,
    /// No Authorization header
    None,
}

/// Identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Web API key of the identity project
    #[serde(default)]
    pub api_key: String,
    /// REST endpoint root
    #[serde(default = "default_identity_endpoint")]
    pub endpoint: String,
    /// Secure token service root, used to renew ID tokens
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Google sign-in; the buttons are hidden when absent
    #[serde(default)]
    pub google: Option<GoogleConfig>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_identity_endpoint(),
            token_endpoint: default_token_endpoint(),
            timeout_secs: default_timeout_secs(),
            google: None,
        }
    }
}

fn default_identity_endpoint() -> String {
    "https://identitytoolkit.googleapis.com/v1".to_string()
}

fn default_token_endpoint() -> String {
    "https://securetoken.googleapis.com/v1".to_string()
}

/// Google OAuth web client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_google_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_google_token_url")]
    pub token_url: String,
}

fn default_google_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_google_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session lifetime in seconds
    #[serde(default = "default_session_ttl")]
    pub ttl_seconds: u64,
    /// Name of the session cookie
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Add the `Secure` attribute to cookies
    #[serde(default)]
    pub secure_cookie: bool,
    /// Capacity of the session cache, kept apart from the profile cache
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_session_ttl(),
            cookie_name: default_cookie_name(),
            secure_cookie: false,
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_max_sessions() -> u64 {
    10_000
}

fn default_session_ttl() -> u64 {
    7 * 24 * 60 * 60
}

fn default_cookie_name() -> String {
    "session".to_string()
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached entries per cache
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    /// Public profile TTL in seconds
    #[serde(default = "default_profile_ttl")]
    pub profile_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
            profile_ttl_seconds: default_profile_ttl(),
        }
    }
}

fn default_max_capacity() -> u64 {
    10_000
}

fn default_profile_ttl() -> u64 {
    300
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: format_yaml_error(&e),
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - MOUTH_METRICS_SERVER_HOST
    /// - MOUTH_METRICS_SERVER_PORT
    /// - MOUTH_METRICS_SERVER_BASE_URL
    /// - MOUTH_METRICS_USERS_API_BASE_URL
    /// - MOUTH_METRICS_USERS_API_TIMEOUT_SECS
    /// - MOUTH_METRICS_USERS_API_TOKEN_MODE
    /// - MOUTH_METRICS_USERS_API_STATIC_TOKEN
    /// - MOUTH_METRICS_IDENTITY_API_KEY
    /// - MOUTH_METRICS_IDENTITY_ENDPOINT
    /// - MOUTH_METRICS_IDENTITY_TOKEN_ENDPOINT
    /// - MOUTH_METRICS_IDENTITY_GOOGLE_CLIENT_ID
    /// - MOUTH_METRICS_IDENTITY_GOOGLE_CLIENT_SECRET
    /// - MOUTH_METRICS_SESSION_TTL_SECONDS
    /// - MOUTH_METRICS_SESSION_SECURE_COOKIE
    /// - MOUTH_METRICS_SESSION_MAX_SESSIONS
    /// - MOUTH_METRICS_CACHE_PROFILE_TTL_SECONDS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the server cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.users_api.token_mode == TokenMode::Static
            && self.users_api.static_token.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigError::ValidationError(
                "users_api.static_token is required when token_mode is 'static'".to_string(),
            ));
        }
        if !self.server.base_url.starts_with("http://") && !self.server.base_url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "server.base_url must be an absolute http(s) URL, got '{}'",
                self.server.base_url
            )));
        }
        if let Some(google) = &self.identity.google {
            if google.client_id.is_empty() || google.client_secret.is_empty() {
                return Err(ConfigError::ValidationError(
                    "identity.google needs both client_id and client_secret".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("MOUTH_METRICS_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("MOUTH_METRICS_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(base_url) = std::env::var("MOUTH_METRICS_SERVER_BASE_URL") {
            self.server.base_url = base_url;
        }

        // Users API configuration
        if let Ok(url) = std::env::var("MOUTH_METRICS_USERS_API_BASE_URL") {
            self.users_api.base_url = url;
        }
        if let Ok(timeout) = std::env::var("MOUTH_METRICS_USERS_API_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.users_api.timeout_secs = timeout;
            }
        }
        if let Ok(mode) = std::env::var("MOUTH_METRICS_USERS_API_TOKEN_MODE") {
            match mode.to_lowercase().as_str() {
                "metadata" => self.users_api.token_mode = TokenMode::Metadata,
                "static" => self.users_api.token_mode = TokenMode::Static,
                "none" => self.users_api.token_mode = TokenMode::None,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(token) = std::env::var("MOUTH_METRICS_USERS_API_STATIC_TOKEN") {
            self.users_api.static_token = Some(token);
        }

        // Identity configuration
        if let Ok(api_key) = std::env::var("MOUTH_METRICS_IDENTITY_API_KEY") {
            self.identity.api_key = api_key;
        }
        if let Ok(endpoint) = std::env::var("MOUTH_METRICS_IDENTITY_ENDPOINT") {
            self.identity.endpoint = endpoint;
        }
        if let Ok(endpoint) = std::env::var("MOUTH_METRICS_IDENTITY_TOKEN_ENDPOINT") {
            self.identity.token_endpoint = endpoint;
        }
        let google_id = std::env::var("MOUTH_METRICS_IDENTITY_GOOGLE_CLIENT_ID").ok();
        let google_secret = std::env::var("MOUTH_METRICS_IDENTITY_GOOGLE_CLIENT_SECRET").ok();
        if google_id.is_some() || google_secret.is_some() {
            let google = self.identity.google.get_or_insert_with(|| GoogleConfig {
                client_id: String::new(),
                client_secret: String::new(),
                auth_url: default_google_auth_url(),
                token_url: default_google_token_url(),
            });
            if let Some(id) = google_id {
                google.client_id = id;
            }
            if let Some(secret) = google_secret {
                google.client_secret = secret;
            }
        }

        // Session configuration
        if let Ok(ttl) = std::env::var("MOUTH_METRICS_SESSION_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.session.ttl_seconds = ttl;
            }
        }
        if let Ok(secure) = std::env::var("MOUTH_METRICS_SESSION_SECURE_COOKIE") {
            if let Ok(secure) = secure.parse::<bool>() {
                self.session.secure_cookie = secure;
            }
        }
        if let Ok(max) = std::env::var("MOUTH_METRICS_SESSION_MAX_SESSIONS") {
            if let Ok(max) = max.parse::<u64>() {
                self.session.max_sessions = max;
            }
        }

        // Cache configuration
        if let Ok(ttl) = std::env::var("MOUTH_METRICS_CACHE_PROFILE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.cache.profile_ttl_seconds = ttl;
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "MOUTH_METRICS_SERVER_HOST",
    "MOUTH_METRICS_SERVER_PORT",
    "MOUTH_METRICS_SERVER_BASE_URL",
    "MOUTH_METRICS_USERS_API_BASE_URL",
    "MOUTH_METRICS_USERS_API_TIMEOUT_SECS",
    "MOUTH_METRICS_USERS_API_TOKEN_MODE",
    "MOUTH_METRICS_USERS_API_STATIC_TOKEN",
    "MOUTH_METRICS_IDENTITY_API_KEY",
    "MOUTH_METRICS_IDENTITY_ENDPOINT",
    "MOUTH_METRICS_IDENTITY_TOKEN_ENDPOINT",
    "MOUTH_METRICS_IDENTITY_GOOGLE_CLIENT_ID",
    "MOUTH_METRICS_IDENTITY_GOOGLE_CLIENT_SECRET",
    "MOUTH_METRICS_SESSION_TTL_SECONDS",
    "MOUTH_METRICS_SESSION_SECURE_COOKIE",
    "MOUTH_METRICS_SESSION_MAX_SESSIONS",
    "MOUTH_METRICS_CACHE_PROFILE_TTL_SECONDS",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        let guard = super::CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        for key in super::ENV_KEYS {
            std::env::remove_var(key);
        }
        guard
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = std::path::Path::new("nonexistent_config.yml");
        let config = Config::load(path).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.base_url, "https://mouth-metrics-d696a.web.app");
        assert_eq!(
            config.users_api.base_url,
            "https://users-164502969077.asia-southeast1.run.app"
        );
        assert_eq!(config.users_api.token_mode, TokenMode::Metadata);
        assert_eq!(config.identity.endpoint, "https://identitytoolkit.googleapis.com/v1");
        assert_eq!(config.identity.token_endpoint, "https://securetoken.googleapis.com/v1");
        assert!(config.identity.google.is_none());
        assert_eq!(config.session.ttl_seconds, 604800);
        assert_eq!(config.session.max_sessions, 10_000);
        assert_eq!(config.session.cookie_name, "session");
        assert_eq!(config.cache.profile_ttl_seconds, 300);
    }

    #[test]
    fn test_load_empty_file_returns_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "   \n").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(config.server.templates_dir.is_none());
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: 3000\nusers_api:\n  token_mode: none\n").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.users_api.token_mode, TokenMode::None);
        assert_eq!(config.users_api.timeout_secs, 10);
        assert_eq!(config.session.cookie_name, "session");
    }

    #[test]
    fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
server:
  host: "127.0.0.1"
  port: 9000
  base_url: "http://localhost:9000/"
  templates_dir: "overrides"
users_api:
  base_url: "http://users.local"
  timeout_secs: 3
  token_mode: static
  static_token: "abc"
identity:
  api_key: "key-123"
  endpoint: "http://identity.local/v1"
  google:
    client_id: "client-1"
    client_secret: "shh"
session:
  ttl_seconds: 60
  cookie_name: "mm_session"
  secure_cookie: true
  max_sessions: 500
cache:
  max_capacity: 10
  profile_ttl_seconds: 5
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.base_url(), "http://localhost:9000");
        assert_eq!(config.server.templates_dir, Some(PathBuf::from("overrides")));
        assert_eq!(config.users_api.token_mode, TokenMode::Static);
        assert_eq!(config.users_api.static_token.as_deref(), Some("abc"));
        assert_eq!(config.identity.api_key, "key-123");
        assert_eq!(config.session.cookie_name, "mm_session");
        assert!(config.session.secure_cookie);
        assert_eq!(config.session.max_sessions, 500);
        let google = config.identity.google.as_ref().unwrap();
        assert_eq!(google.client_id, "client-1");
        assert_eq!(google.auth_url, "https://accounts.google.com/o/oauth2/v2/auth");
        assert_eq!(config.cache.max_capacity, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_invalid_yaml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: not_a_number\n").unwrap();

        let err = Config::load(file.path()).unwrap_err().to_string();
        assert!(err.contains("parse"));
    }

    #[test]
    fn test_load_unknown_token_mode_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "users_api:\n  token_mode: oauth\n").unwrap();

        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_validate_static_mode_requires_token() {
        let mut config = Config::default();
        config.users_api.token_mode = TokenMode::Static;
        assert!(config.validate().is_err());

        config.users_api.static_token = Some("t".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_relative_base_url_rejected() {
        let mut config = Config::default();
        config.server.base_url = "mouth-metrics.app".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_google_requires_secret() {
        let mut config = Config::default();
        config.identity.google = Some(GoogleConfig {
            client_id: "id".to_string(),
            client_secret: String::new(),
            auth_url: default_google_auth_url(),
            token_url: default_google_token_url(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_enables_google() {
        let _guard = lock_env();

        std::env::set_var("MOUTH_METRICS_IDENTITY_GOOGLE_CLIENT_ID", "env-client");
        std::env::set_var("MOUTH_METRICS_IDENTITY_GOOGLE_CLIENT_SECRET", "env-secret");
        std::env::set_var("MOUTH_METRICS_SESSION_MAX_SESSIONS", "42");

        let config = Config::load_with_env(std::path::Path::new("nonexistent_config.yml")).unwrap();

        let google = config.identity.google.unwrap();
        assert_eq!(google.client_id, "env-client");
        assert_eq!(google.token_url, "https://oauth2.googleapis.com/token");
        assert_eq!(config.session.max_sessions, 42);

        for key in super::ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_override_server_and_identity() {
        let _guard = lock_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: 8080\n").unwrap();

        std::env::set_var("MOUTH_METRICS_SERVER_PORT", "4000");
        std::env::set_var("MOUTH_METRICS_SERVER_BASE_URL", "http://example.test");
        std::env::set_var("MOUTH_METRICS_IDENTITY_API_KEY", "env-key");

        let config = Config::load_with_env(file.path()).unwrap();

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.base_url, "http://example.test");
        assert_eq!(config.identity.api_key, "env-key");

        for key in super::ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_override_token_mode() {
        let _guard = lock_env();

        std::env::set_var("MOUTH_METRICS_USERS_API_TOKEN_MODE", "STATIC");
        std::env::set_var("MOUTH_METRICS_USERS_API_STATIC_TOKEN", "from-env");

        let config = Config::load_with_env(std::path::Path::new("nonexistent_config.yml")).unwrap();

        assert_eq!(config.users_api.token_mode, TokenMode::Static);
        assert_eq!(config.users_api.static_token.as_deref(), Some("from-env"));

        for key in super::ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_override_invalid_values_ignored() {
        let _guard = lock_env();

        std::env::set_var("MOUTH_METRICS_SERVER_PORT", "not_a_number");
        std::env::set_var("MOUTH_METRICS_USERS_API_TOKEN_MODE", "kerberos");
        std::env::set_var("MOUTH_METRICS_SESSION_SECURE_COOKIE", "maybe");

        let config = Config::load_with_env(std::path::Path::new("nonexistent_config.yml")).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.users_api.token_mode, TokenMode::Metadata);
        assert!(!config.session.secure_cookie);

        for key in super::ENV_KEYS {
            std::env::remove_var(key);
        }
    }
}
