//! Fleet Configuration Management
//!
//! Configuration is assembled once at startup from environment variables
//! and an optional TOML file, then validated. A process with a missing
//! signing secret or row-store credential refuses to start.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Token signing and password policy
    pub auth: AuthConfig,

    /// External REST row store
    pub row_store: RowStoreConfig,

    /// External geocoder
    pub geocoding: GeocodingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables on top of defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse("API_PORT")? {
            self.server.port = port;
        }
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.server.cors_origins = parse_origin_list(&origins);
        }

        // Auth
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(ttl) = env_parse("JWT_TTL_SECS")? {
            self.auth.token_ttl_secs = ttl;
        }
        if let Some(len) = env_parse("PASSWORD_MIN_LENGTH")? {
            self.auth.password_min_length = len;
        }
        if let Ok(identifier) = std::env::var("BOOTSTRAP_ADMIN_IDENTIFIER") {
            self.auth.bootstrap_admin_identifier = identifier;
        }
        if let Ok(password) = std::env::var("BOOTSTRAP_ADMIN_PASSWORD") {
            self.auth.bootstrap_admin_password = password;
        }

        // Row store
        if let Ok(url) = std::env::var("ROW_STORE_URL") {
            self.row_store.url = url;
        }
        if let Ok(key) = std::env::var("ROW_STORE_SERVICE_KEY") {
            self.row_store.service_key = key;
        }

        // Geocoding
        if let Ok(token) = std::env::var("MAPBOX_ACCESS_TOKEN") {
            self.geocoding.access_token = Some(token).filter(|t| !t.trim().is_empty());
        }
        if let Ok(url) = std::env::var("MAPBOX_BASE_URL") {
            self.geocoding.base_url = url;
        }
        if let Some(max) = env_parse("GEOCODE_MAX_ADDRESSES")? {
            self.geocoding.max_addresses = max;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = env_parse("LOG_JSON")? {
            self.logging.json_format = json;
        }

        Ok(())
    }

    /// Check that every credential the server cannot run without is present
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if self.row_store.url.trim().is_empty() {
            return Err(ConfigError::MissingRequired("ROW_STORE_URL".to_string()));
        }
        if self.row_store.service_key.trim().is_empty() {
            return Err(ConfigError::MissingRequired(
                "ROW_STORE_SERVICE_KEY".to_string(),
            ));
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "JWT_TTL_SECS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.auth.password_min_length == 0 {
            return Err(ConfigError::InvalidValue {
                key: "PASSWORD_MIN_LENGTH".to_string(),
                value: "0".to_string(),
            });
        }
        if self.geocoding.max_addresses == 0 {
            return Err(ConfigError::InvalidValue {
                key: "GEOCODE_MAX_ADDRESSES".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        Err(_) => Ok(None),
    }
}

/// Split a comma-separated origin list, dropping blanks
pub fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed origins for CORS; a single `*` allows any origin
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    /// Whether the allow-list is the wildcard
    pub fn cors_allows_any(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            // Empty by default - set via CORS_ORIGINS
            cors_origins: vec![],
        }
    }
}

/// Token and password settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC-SHA256 signing secret
    pub jwt_secret: String,

    /// Bearer token lifetime in seconds
    pub token_ttl_secs: u64,

    /// Minimum accepted password length
    pub password_min_length: usize,

    /// Identifier that lazily provisions the first administrator
    pub bootstrap_admin_identifier: String,

    /// Password given to the provisioned administrator
    pub bootstrap_admin_password: String,

    /// Argon2 memory cost in KiB
    pub hash_memory_kib: u32,

    /// Argon2 iterations
    pub hash_iterations: u32,

    /// Argon2 lanes
    pub hash_parallelism: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_secs: 24 * 60 * 60,
            password_min_length: 8,
            bootstrap_admin_identifier: "admin@example.com".to_string(),
            bootstrap_admin_password: "changeme123".to_string(),
            hash_memory_kib: 19_456,
            hash_iterations: 2,
            hash_parallelism: 1,
        }
    }
}

/// REST row store connection
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RowStoreConfig {
    /// Base URL of the REST endpoint, e.g. `https://db.example.com/rest/v1`
    pub url: String,

    /// Service credential sent as `apikey` and bearer token
    pub service_key: String,
}

/// Geocoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// Mapbox access token; geocoding routes answer CONFIG_ERROR without it
    pub access_token: Option<String>,

    /// Mapbox API base URL
    pub base_url: String,

    /// Maximum addresses accepted per request after normalization
    pub max_addresses: usize,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            base_url: "https://api.mapbox.com".to_string(),
            max_addresses: 150,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
