//! Configuration loading and validation.
//!
//! Config is written in JSON5 and lives at `~/.evently/evently.json` unless
//! `EVENTLY_STATE_DIR` points elsewhere. Environment overrides are applied
//! explicitly by the caller via [`AuthConfig::with_env_overrides`]; nothing in
//! the auth core reads the environment on its own.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default access token lifetime in minutes.
const DEFAULT_ACCESS_EXPIRY_MINUTES: u64 = 15;
/// Default refresh token lifetime in days.
const DEFAULT_REFRESH_EXPIRY_DAYS: u64 = 10;
/// Longest accepted access token lifetime in minutes (one week).
pub const MAX_ACCESS_EXPIRY_MINUTES: u64 = 7 * 24 * 60;
/// Longest accepted refresh token lifetime in days.
pub const MAX_REFRESH_EXPIRY_DAYS: u64 = 365;
/// Default login attempts allowed per email per minute.
const DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE: u32 = 10;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Token and session configuration.
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// A missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a path.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        std::fs::write(path, content)?;

        // Secrets may be stored here
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("evently.json")
    }

    /// Get the Evently state directory.
    ///
    /// Uses `EVENTLY_STATE_DIR` env var if set, otherwise `~/.evently`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("EVENTLY_STATE_DIR") {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".evently")
        } else {
            PathBuf::from(".evently")
        }
    }

    /// Get the directory holding the identity and event databases.
    #[must_use]
    pub fn data_dir() -> PathBuf {
        Self::state_dir().join("data")
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.port == 0 {
            return Err(ConfigError::Validation(
                "Gateway port cannot be 0".to_string(),
            ));
        }

        self.auth.validate()
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address mode.
    #[serde(default)]
    pub mode: BindMode,

    /// Enable CORS.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            mode: BindMode::default(),
            cors: true,
            timeout_secs: default_timeout(),
        }
    }
}

impl GatewayConfig {
    /// Resolve the bind mode into a concrete address.
    #[must_use]
    pub fn bind_address(&self) -> String {
        match &self.mode {
            BindMode::Local => "127.0.0.1".to_string(),
            BindMode::Public => "0.0.0.0".to_string(),
            BindMode::Custom(addr) => addr.clone(),
        }
    }
}

const fn default_port() -> u16 {
    8000
}

const fn default_timeout() -> u64 {
    30
}

const fn default_true() -> bool {
    true
}

const fn default_access_expiry() -> u64 {
    DEFAULT_ACCESS_EXPIRY_MINUTES
}

const fn default_refresh_expiry() -> u64 {
    DEFAULT_REFRESH_EXPIRY_DAYS
}

const fn default_login_attempts() -> u32 {
    DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE
}

/// Gateway bind mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    /// Bind to localhost only.
    #[default]
    Local,
    /// Bind to all interfaces.
    Public,
    /// Custom bind address.
    Custom(String),
}

/// Token and session configuration.
///
/// Access and refresh tokens are signed with two different secrets and carry
/// two different lifetimes.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Access token signing secret (hex). Generated per process if unset.
    #[serde(default)]
    pub access_token_secret: Option<String>,

    /// Refresh token signing secret (hex). Generated per process if unset.
    #[serde(default)]
    pub refresh_token_secret: Option<String>,

    /// Access token lifetime in minutes.
    #[serde(default = "default_access_expiry")]
    pub access_expiry_minutes: u64,

    /// Refresh token lifetime in days.
    #[serde(default = "default_refresh_expiry")]
    pub refresh_expiry_days: u64,

    /// Mark session cookies `Secure`.
    #[serde(default = "default_true")]
    pub secure_cookies: bool,

    /// Login attempts allowed per email address per minute.
    #[serde(default = "default_login_attempts")]
    pub login_attempts_per_minute: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_secret: None,
            refresh_token_secret: None,
            access_expiry_minutes: default_access_expiry(),
            refresh_expiry_days: default_refresh_expiry(),
            secure_cookies: true,
            login_attempts_per_minute: default_login_attempts(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token_secret", &self.access_token_secret.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token_secret", &self.refresh_token_secret.as_ref().map(|_| "[REDACTED]"))
            .field("access_expiry_minutes", &self.access_expiry_minutes)
            .field("refresh_expiry_days", &self.refresh_expiry_days)
            .field("secure_cookies", &self.secure_cookies)
            .field("login_attempts_per_minute", &self.login_attempts_per_minute)
            .finish()
    }
}

impl AuthConfig {
    /// Create a new auth config builder.
    #[must_use]
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Get access token lifetime as Duration.
    #[must_use]
    pub const fn access_expiry(&self) -> Duration {
        Duration::from_secs(self.access_expiry_minutes.saturating_mul(60))
    }

    /// Get refresh token lifetime as Duration.
    #[must_use]
    pub const fn refresh_expiry(&self) -> Duration {
        Duration::from_secs(self.refresh_expiry_days.saturating_mul(24 * 3600))
    }

    /// Apply environment variable overrides.
    ///
    /// Unparseable numeric values are ignored with a warning.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(secret) = std::env::var("EVENTLY_ACCESS_TOKEN_SECRET") {
            self.access_token_secret = Some(secret);
        }

        if let Ok(secret) = std::env::var("EVENTLY_REFRESH_TOKEN_SECRET") {
            self.refresh_token_secret = Some(secret);
        }

        if let Ok(value) = std::env::var("EVENTLY_ACCESS_TOKEN_EXPIRY_MINUTES") {
            match value.parse() {
                Ok(minutes) => self.access_expiry_minutes = minutes,
                Err(_) => tracing::warn!(%value, "Ignoring invalid EVENTLY_ACCESS_TOKEN_EXPIRY_MINUTES"),
            }
        }

        if let Ok(value) = std::env::var("EVENTLY_REFRESH_TOKEN_EXPIRY_DAYS") {
            match value.parse() {
                Ok(days) => self.refresh_expiry_days = days,
                Err(_) => tracing::warn!(%value, "Ignoring invalid EVENTLY_REFRESH_TOKEN_EXPIRY_DAYS"),
            }
        }

        self
    }

    /// Validate lifetimes and secret distinctness.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` on an out-of-range lifetime or a
    /// shared secret.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_ACCESS_EXPIRY_MINUTES).contains(&self.access_expiry_minutes) {
            return Err(ConfigError::Validation(format!(
                "Access token expiry must be between 1 and {MAX_ACCESS_EXPIRY_MINUTES} minutes"
            )));
        }

        if !(1..=MAX_REFRESH_EXPIRY_DAYS).contains(&self.refresh_expiry_days) {
            return Err(ConfigError::Validation(format!(
                "Refresh token expiry must be between 1 and {MAX_REFRESH_EXPIRY_DAYS} days"
            )));
        }

        if let (Some(access), Some(refresh)) =
            (&self.access_token_secret, &self.refresh_token_secret)
        {
            if access.eq_ignore_ascii_case(refresh) {
                return Err(ConfigError::Validation(
                    "Access and refresh token secrets must differ".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Builder for `AuthConfig`.
#[derive(Debug, Default)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    /// Set the access token secret (hex).
    #[must_use]
    pub fn access_token_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.access_token_secret = Some(secret.into());
        self
    }

    /// Set the refresh token secret (hex).
    #[must_use]
    pub fn refresh_token_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.refresh_token_secret = Some(secret.into());
        self
    }

    /// Set access token lifetime in minutes.
    #[must_use]
    pub const fn access_expiry_minutes(mut self, minutes: u64) -> Self {
        self.config.access_expiry_minutes = minutes;
        self
    }

    /// Set refresh token lifetime in days.
    #[must_use]
    pub const fn refresh_expiry_days(mut self, days: u64) -> Self {
        self.config.refresh_expiry_days = days;
        self
    }

    /// Set whether session cookies carry the `Secure` flag.
    #[must_use]
    pub const fn secure_cookies(mut self, secure: bool) -> Self {
        self.config.secure_cookies = secure;
        self
    }

    /// Set the per-email login attempt budget.
    #[must_use]
    pub const fn login_attempts_per_minute(mut self, attempts: u32) -> Self {
        self.config.login_attempts_per_minute = attempts;
        self
    }

    /// Build the config.
    #[must_use]
    pub fn build(self) -> AuthConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.auth.access_expiry_minutes, 15);
        assert_eq!(config.auth.refresh_expiry_days, 10);
        assert!(config.auth.access_token_secret.is_none());
    }

    #[test]
    fn test_config_roundtrip() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("evently.json");

        let mut config = Config::default();
        config.gateway.port = 9100;
        config.auth.access_expiry_minutes = 5;

        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.gateway.port, 9100);
        assert_eq!(loaded.auth.access_expiry_minutes, 5);
    }

    #[test]
    fn test_json5_parsing() {
        let json5_content = r#"{
            // This is a comment
            gateway: {
                port: 8080,
                mode: "public",
            },
            auth: {
                accessExpiryMinutes: 30,
                // trailing comma
            },
        }"#;

        let config: Config = json5::from_str(json5_content).unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.bind_address(), "0.0.0.0");
        assert_eq!(config.auth.access_expiry_minutes, 30);
        assert_eq!(config.auth.refresh_expiry_days, 10);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.gateway.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.auth.access_expiry_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lifetime_upper_bounds() {
        let at_limit = AuthConfig::builder()
            .access_expiry_minutes(MAX_ACCESS_EXPIRY_MINUTES)
            .refresh_expiry_days(MAX_REFRESH_EXPIRY_DAYS)
            .build();
        assert!(at_limit.validate().is_ok());

        let auth = AuthConfig::builder()
            .access_expiry_minutes(MAX_ACCESS_EXPIRY_MINUTES + 1)
            .build();
        assert!(matches!(auth.validate(), Err(ConfigError::Validation(_))));

        let auth = AuthConfig::builder().refresh_expiry_days(100_000_000).build();
        assert!(matches!(auth.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_huge_lifetime_saturates() {
        let auth = AuthConfig::builder().refresh_expiry_days(u64::MAX).build();
        assert_eq!(auth.refresh_expiry(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_shared_secret_rejected() {
        let auth = AuthConfig::builder()
            .access_token_secret("abcd")
            .refresh_token_secret("ABCD")
            .build();

        assert!(matches!(auth.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_builder_and_durations() {
        let auth = AuthConfig::builder()
            .access_expiry_minutes(10)
            .refresh_expiry_days(2)
            .secure_cookies(false)
            .build();

        assert_eq!(auth.access_expiry(), Duration::from_secs(600));
        assert_eq!(auth.refresh_expiry(), Duration::from_secs(2 * 24 * 3600));
        assert!(!auth.secure_cookies);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let auth = AuthConfig::builder().access_token_secret("deadbeef").build();
        let debug = format!("{auth:?}");
        assert!(!debug.contains("deadbeef"));
        assert!(debug.contains("REDACTED"));
    }
}
