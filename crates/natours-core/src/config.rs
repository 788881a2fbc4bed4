//! Natours Configuration Management
//!
//! Handles configuration from environment variables and TOML files,
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment mode (controls error detail and cookie flags)
    pub environment: Environment,

    /// Server configuration
    pub server: ServerConfig,

    /// Token, cookie and password hashing settings
    pub auth: AuthConfig,

    /// Outbound email settings
    pub email: EmailConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Per-client request limits
    pub rate_limit: RateLimitConfig,

    /// Administrator account created at startup when missing
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl AppConfig {
    /// Load configuration from environment variables
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

    /// Configuration used by the test suites: light password hashing and a
    /// fixed secret.
    pub fn for_testing() -> Self {
        Self {
            auth: AuthConfig {
                jwt_secret: "test-secret-key-with-enough-entropy-for-hs256".to_string(),
                password_memory_cost: 4096,
                password_time_cost: 1,
                password_parallelism: 1,
                ..AuthConfig::default()
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                ..RateLimitConfig::default()
            },
            ..Self::default()
        }
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(env) = std::env::var("NATOURS_ENV") {
            self.environment = env.parse()?;
        }

        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("API_PORT") {
            self.server.port = parse_var("API_PORT", port)?;
        }
        if let Ok(public_host) = std::env::var("PUBLIC_HOST") {
            self.server.public_host = Some(public_host).filter(|h| !h.is_empty());
        }
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Auth
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(issuer) = std::env::var("JWT_ISSUER") {
            self.auth.jwt_issuer = issuer;
        }
        if let Ok(secs) = std::env::var("JWT_EXPIRES_IN_SECS") {
            self.auth.jwt_expires_in_secs = parse_var("JWT_EXPIRES_IN_SECS", secs)?;
        }
        if let Ok(mins) = std::env::var("RESET_TOKEN_TTL_MINS") {
            self.auth.reset_token_ttl_mins = parse_var("RESET_TOKEN_TTL_MINS", mins)?;
        }

        // Email
        if let Ok(from) = std::env::var("EMAIL_FROM") {
            self.email.from = from;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.json_format = format.eq_ignore_ascii_case("json");
        }

        // Rate limiting
        if let Ok(enabled) = std::env::var("RATE_LIMIT_ENABLED") {
            self.rate_limit.enabled = parse_var("RATE_LIMIT_ENABLED", enabled)?;
        }

        // Bootstrap administrator
        if let (Ok(email), Ok(password)) = (
            std::env::var("ADMIN_EMAIL"),
            std::env::var("ADMIN_PASSWORD"),
        ) {
            self.bootstrap_admin = Some(BootstrapAdmin {
                name: std::env::var("ADMIN_NAME").unwrap_or_else(|_| "Administrator".to_string()),
                email,
                password,
            });
        }

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Deployment mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ConfigError::InvalidValue {
                key: "NATOURS_ENV".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Host put into emailed links; when unset, development falls back to
    /// the request's Host header
    pub public_host: Option<String>,

    /// Maximum request body size in bytes
    pub max_body_size: usize,

    /// Allowed origins for CORS (empty allows any origin)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_host: None,
            max_body_size: 10 * 1024,
            cors_origins: vec![],
        }
    }
}

/// Authentication configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Secret key for HMAC signing of session tokens
    pub jwt_secret: String,

    /// Token issuer identifier
    pub jwt_issuer: String,

    /// Session token lifetime in seconds
    pub jwt_expires_in_secs: u64,

    /// Password reset token lifetime in minutes
    pub reset_token_ttl_mins: i64,

    /// Argon2 memory cost in KiB
    pub password_memory_cost: u32,

    /// Argon2 iterations
    pub password_time_cost: u32,

    /// Argon2 lanes
    pub password_parallelism: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "development-secret-key-change-in-production".to_string(),
            jwt_issuer: "natours-api".to_string(),
            jwt_expires_in_secs: 90 * 24 * 60 * 60,
            reset_token_ttl_mins: 10,
            password_memory_cost: 65536,
            password_time_cost: 3,
            password_parallelism: 4,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_expires_in_secs", &self.jwt_expires_in_secs)
            .field("reset_token_ttl_mins", &self.reset_token_ttl_mins)
            .field("password_memory_cost", &self.password_memory_cost)
            .field("password_time_cost", &self.password_time_cost)
            .field("password_parallelism", &self.password_parallelism)
            .finish()
    }
}

/// Outbound email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Sender address
    pub from: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from: "Natours <hello@natours.dev>".to_string(),
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

/// Token bucket per client IP: `burst` requests at once, one more every
/// `period_secs`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimit {
    pub burst: u32,
    pub period_secs: u64,
}

/// Rate limits for the API and, tighter, for the credential endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Everything under `/api/v1`
    pub api: RateLimit,
    /// signup, login, forgotPassword and resetPassword
    pub auth: RateLimit,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // 100 requests per hour
            api: RateLimit {
                burst: 100,
                period_secs: 36,
            },
            auth: RateLimit {
                burst: 10,
                period_secs: 60,
            },
        }
    }
}

/// Administrator account seeded at startup
#[derive(Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
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
}
