//! Configuration management
//!
//! Configuration is loaded from `config.yml` and can be overridden with
//! `PEMUDA_<SECTION>_<KEY>` environment variables. Every field has a default,
//! so a missing or empty file yields a working development setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "PEMUDA";

/// Upper bound for `auth.session_days` (ten years)
const MAX_SESSION_DAYS: i64 = 3650;

/// Upper bound for `auth.reset_token_minutes` (one day)
const MAX_RESET_TOKEN_MINUTES: i64 = 1440;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub theme: ThemeConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub captcha: CaptchaConfig,
    #[serde(default)]
    pub auth: AuthConfig,
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
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Public base URL, used for links in outgoing email
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`.
    /// Enable only behind a reverse proxy that sets these headers.
    #[serde(default)]
    pub trust_proxy: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            base_url: default_base_url(),
            trust_proxy: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

/// Database configuration (SQLite)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path or `sqlite:` URL. `:memory:` for an in-memory database.
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum pool connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "data/pemuda.db".to_string()
}

fn default_max_connections() -> u32 {
    20
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    3600
}

fn default_max_capacity() -> u64 {
    10_000
}

/// Theme (server-rendered templates) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// Active theme name
    #[serde(default = "default_theme")]
    pub active: String,
    /// Path to themes directory
    #[serde(default = "default_theme_path")]
    pub path: PathBuf,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            active: default_theme(),
            path: default_theme_path(),
        }
    }
}

fn default_theme() -> String {
    "default".to_string()
}

fn default_theme_path() -> PathBuf {
    PathBuf::from("themes")
}

/// Where uploaded images end up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UploadDriver {
    /// Saved on local disk and served under `public_prefix`
    #[default]
    Local,
    /// Forwarded to a CDN-backed image endpoint
    Remote,
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub driver: UploadDriver,
    /// Upload directory path (local driver)
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// URL prefix files are served under (local driver)
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
    /// Maximum file size in bytes (default: 5MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed image MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
    /// Image endpoint (remote driver)
    #[serde(default)]
    pub remote_endpoint: Option<String>,
    /// Bearer key for the image endpoint (remote driver)
    #[serde(default)]
    pub remote_api_key: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            driver: UploadDriver::default(),
            path: default_upload_path(),
            public_prefix: default_public_prefix(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
            remote_endpoint: None,
            remote_api_key: None,
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_public_prefix() -> String {
    "/uploads".to_string()
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
        "image/svg+xml".to_string(),
    ]
}

impl UploadConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }

    /// Get file extension for a MIME type
    pub fn get_extension(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/svg+xml" => "svg",
            _ => "bin",
        }
    }
}

/// Outgoing mail (SMTP) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// SMTP relay host. Empty disables delivery (messages are logged).
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: String,
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: default_from_address(),
            from_name: default_from_name(),
        }
    }
}

impl MailConfig {
    /// Whether SMTP delivery is configured
    pub fn is_enabled(&self) -> bool {
        !self.smtp_host.trim().is_empty()
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "noreply@pemudamagelang.id".to_string()
}

fn default_from_name() -> String {
    "Pemuda Magelang".to_string()
}

/// Cloudflare Turnstile configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Public site key rendered into forms
    #[serde(default)]
    pub site_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_verify_url")]
    pub verify_url: String,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            site_key: String::new(),
            secret_key: String::new(),
            verify_url: default_verify_url(),
        }
    }
}

fn default_verify_url() -> String {
    "https://challenges.cloudflare.com/turnstile/v0/siteverify".to_string()
}

/// Session and password reset lifetimes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_days")]
    pub session_days: i64,
    #[serde(default = "default_reset_token_minutes")]
    pub reset_token_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_days: default_session_days(),
            reset_token_minutes: default_reset_token_minutes(),
        }
    }
}

fn default_session_days() -> i64 {
    7
}

fn default_reset_token_minutes() -> i64 {
    60
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
    /// If the file doesn't exist or is empty, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with the location.
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
    /// Environment variables follow the pattern `PEMUDA_<SECTION>_<KEY>`, e.g.
    /// `PEMUDA_SERVER_PORT`, `PEMUDA_DATABASE_URL`, `PEMUDA_CAPTCHA_SECRET_KEY`.
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot work at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.captcha.enabled && self.captcha.secret_key.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "captcha.enabled requires captcha.secret_key".to_string(),
            ));
        }
        if self.upload.driver == UploadDriver::Remote && self.upload.remote_endpoint.is_none() {
            return Err(ConfigError::ValidationError(
                "upload.driver 'remote' requires upload.remote_endpoint".to_string(),
            ));
        }
        let prefix = self.upload.public_prefix.trim_end_matches('/');
        if !prefix.starts_with('/') || prefix.len() < 2 {
            return Err(ConfigError::ValidationError(
                "upload.public_prefix must be a path below the root, e.g. /uploads".to_string(),
            ));
        }
        if !(1..=MAX_SESSION_DAYS).contains(&self.auth.session_days) {
            return Err(ConfigError::ValidationError(format!(
                "auth.session_days must be between 1 and {}",
                MAX_SESSION_DAYS
            )));
        }
        if !(1..=MAX_RESET_TOKEN_MINUTES).contains(&self.auth.reset_token_minutes) {
            return Err(ConfigError::ValidationError(format!(
                "auth.reset_token_minutes must be between 1 and {}",
                MAX_RESET_TOKEN_MINUTES
            )));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server
        if let Some(host) = env_var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse::<u16>("SERVER_PORT") {
            self.server.port = port;
        }
        if let Some(origin) = env_var("SERVER_CORS_ORIGIN") {
            self.server.cors_origin = origin;
        }
        if let Some(base_url) = env_var("SERVER_BASE_URL") {
            self.server.base_url = base_url;
        }
        if let Some(trust) = env_parse::<bool>("SERVER_TRUST_PROXY") {
            self.server.trust_proxy = trust;
        }

        // Database
        if let Some(url) = env_var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(max) = env_parse::<u32>("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = max;
        }

        // Cache
        if let Some(ttl) = env_parse::<u64>("CACHE_TTL_SECONDS") {
            self.cache.ttl_seconds = ttl;
        }
        if let Some(capacity) = env_parse::<u64>("CACHE_MAX_CAPACITY") {
            self.cache.max_capacity = capacity;
        }

        // Theme
        if let Some(active) = env_var("THEME_ACTIVE") {
            self.theme.active = active;
        }
        if let Some(path) = env_var("THEME_PATH") {
            self.theme.path = PathBuf::from(path);
        }

        // Upload
        if let Some(driver) = env_var("UPLOAD_DRIVER") {
            match driver.to_lowercase().as_str() {
                "local" => self.upload.driver = UploadDriver::Local,
                "remote" => self.upload.driver = UploadDriver::Remote,
                _ => {}
            }
        }
        if let Some(path) = env_var("UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }
        if let Some(size) = env_parse::<u64>("UPLOAD_MAX_FILE_SIZE") {
            self.upload.max_file_size = size;
        }
        if let Some(endpoint) = env_var("UPLOAD_REMOTE_ENDPOINT") {
            self.upload.remote_endpoint = Some(endpoint);
        }
        if let Some(key) = env_var("UPLOAD_REMOTE_API_KEY") {
            self.upload.remote_api_key = Some(key);
        }

        // Mail
        if let Some(host) = env_var("MAIL_SMTP_HOST") {
            self.mail.smtp_host = host;
        }
        if let Some(port) = env_parse::<u16>("MAIL_SMTP_PORT") {
            self.mail.smtp_port = port;
        }
        if let Some(username) = env_var("MAIL_SMTP_USERNAME") {
            self.mail.smtp_username = username;
        }
        if let Some(password) = env_var("MAIL_SMTP_PASSWORD") {
            self.mail.smtp_password = password;
        }
        if let Some(from) = env_var("MAIL_FROM_ADDRESS") {
            self.mail.from_address = from;
        }

        // Captcha
        if let Some(enabled) = env_parse::<bool>("CAPTCHA_ENABLED") {
            self.captcha.enabled = enabled;
        }
        if let Some(site_key) = env_var("CAPTCHA_SITE_KEY") {
            self.captcha.site_key = site_key;
        }
        if let Some(secret) = env_var("CAPTCHA_SECRET_KEY") {
            self.captcha.secret_key = secret;
        }

        // Auth
        if let Some(days) = env_parse::<i64>("AUTH_SESSION_DAYS") {
            self.auth.session_days = days;
        }
        if let Some(minutes) = env_parse::<i64>("AUTH_RESET_TOKEN_MINUTES") {
            self.auth.reset_token_minutes = minutes;
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, key)).ok()
}

/// Read and parse an override; unparsable values are ignored
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_var(key).and_then(|v| v.trim().parse::<T>().ok())
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!("at line {}, column {}: {}", location.line(), location.column(), e)
    } else {
        e.to_string()
    }
}

// Shared by every test that touches the process environment.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn port_round_trips_through_yaml(port in 1u16..=65535) {
            let mut file = NamedTempFile::new().unwrap();
            write!(file, "server:\n  port: {}\n", port).unwrap();
            let config = Config::load(file.path()).unwrap();
            prop_assert_eq!(config.server.port, port);
            prop_assert_eq!(config.server.host, "0.0.0.0");
        }

        #[test]
        fn session_days_env_override(days in 1i64..365) {
            let _guard = super::CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let file = NamedTempFile::new().unwrap();
            std::env::set_var("PEMUDA_AUTH_SESSION_DAYS", days.to_string());
            let config = Config::load_with_env(file.path());
            std::env::remove_var("PEMUDA_AUTH_SESSION_DAYS");
            prop_assert_eq!(config.unwrap().auth.session_days, days);
        }
    }
}
