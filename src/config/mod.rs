//! Configuration management
//!
//! This module provides YAML-based configuration management with support for:
//! - Environment variable overrides
//! - Multiple configuration file locations
//! - Default values for all settings
//! - External service endpoints (tenant API, message bus, blob storage,
//!   search engine)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Tenant/user-profile API (validates tenant access on every request)
    #[serde(default)]
    pub tenant_api: Option<TenantApiConfig>,
    /// Message bus producer configuration
    #[serde(default)]
    pub kafka: Option<KafkaConfig>,
    /// Blob storage for rendered PDF files
    #[serde(default)]
    pub object_storage: Option<ObjectStorageConfig>,
    /// Search engine used for the processed-events chart series
    #[serde(default)]
    pub opensearch: Option<OpenSearchConfig>,
    #[serde(default)]
    pub reports: ReportsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// TLS/HTTPS configuration (if not set, server runs HTTP)
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

/// TLS/HTTPS configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to TLS certificate file (PEM format)
    pub cert_file: PathBuf,
    /// Path to TLS private key file (PEM format)
    pub key_file: PathBuf,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7000
}

fn default_workers() -> usize {
    num_cpus::get()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
            tls: None,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "sqlite://data/siem-reports.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// HMAC secret for JWT validation. Generated at startup when unset,
    /// which invalidates tokens across restarts.
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_token_expiry_hours")]
    pub token_expiry_hours: u64,
}

fn default_token_expiry_hours() -> u64 {
    8
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_expiry_hours: default_token_expiry_hours(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Log output target
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    #[default]
    Console,
    File,
    Both,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub target: LogTarget,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_log_file")]
    pub file_name: String,
    /// Rotate the log file daily instead of appending forever
    #[serde(default)]
    pub rotate_daily: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_file() -> String {
    "siem-reports.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            log_dir: default_log_dir(),
            file_name: default_log_file(),
            rotate_daily: false,
        }
    }
}

/// Tenant API connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TenantApiConfig {
    pub url: String,
    #[serde(default = "default_timeout", alias = "timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

/// Message bus (Kafka) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    /// Comma-separated bootstrap servers
    pub brokers: String,
    /// SASL/SSL credentials; plaintext when unset
    #[serde(default)]
    pub sasl: Option<KafkaSaslConfig>,
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
}

/// SASL PLAIN credentials for the message bus
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaSaslConfig {
    pub username: String,
    pub password: String,
}

fn default_message_timeout_ms() -> u64 {
    5000
}

/// Blob storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectStorageConfig {
    /// Base URL of the object storage HTTP API
    pub endpoint: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Bearer token for uploads
    pub token: String,
    /// Deployment environment, used as the object name prefix
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_timeout", alias = "timeout")]
    pub timeout_secs: u64,
}

fn default_bucket() -> String {
    "report-blob-storage".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

/// Search engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenSearchConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_search_index")]
    pub index_pattern: String,
    #[serde(default = "default_timeout", alias = "timeout")]
    pub timeout_secs: u64,
}

fn default_search_index() -> String {
    "report-search-*".to_string()
}

/// Report rendering configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportsConfig {
    /// Directory where rendered PDF files are written
    #[serde(default = "default_reports_dir")]
    pub output_dir: PathBuf,
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_reports_dir(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
            tenant_api: None,
            kafka: None,
            object_storage: None,
            opensearch: None,
            reports: ReportsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values
    /// 2. Configuration file (YAML)
    /// 3. Environment variables (prefixed with SIEM_REPORTS_)
    pub fn load() -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let config_path = std::env::var("SIEM_REPORTS_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = if let Some(ref path) = config_path {
            if path.exists() {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                serde_norway::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file: {:?}", path))?
            } else {
                AppConfig::default()
            }
        } else {
            AppConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = vec![
            PathBuf::from("config.yaml"),
            PathBuf::from("config/config.yaml"),
            PathBuf::from("/etc/siem-reports/config.yaml"),
        ];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("siem-reports/config.yaml"));
        }

        paths.into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("SIEM_REPORTS_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("SIEM_REPORTS_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(url) = std::env::var("SIEM_REPORTS_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(secret) = std::env::var("SIEM_REPORTS_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(level) = std::env::var("SIEM_REPORTS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(url) = std::env::var("SIEM_REPORTS_TENANT_API_URL") {
            match self.tenant_api {
                Some(ref mut t) => t.url = url,
                None => {
                    self.tenant_api = Some(TenantApiConfig {
                        url,
                        timeout_secs: default_timeout(),
                    })
                }
            }
        }
        if let Ok(brokers) = std::env::var("SIEM_REPORTS_KAFKA_BROKERS") {
            match self.kafka {
                Some(ref mut k) => k.brokers = brokers,
                None => {
                    self.kafka = Some(KafkaConfig {
                        brokers,
                        sasl: None,
                        message_timeout_ms: default_message_timeout_ms(),
                    })
                }
            }
        }
        if let Ok(dir) = std::env::var("SIEM_REPORTS_OUTPUT_DIR") {
            self.reports.output_dir = PathBuf::from(dir);
        }
    }

    /// Validate the configuration, filling in a generated JWT secret when
    /// none was provided
    fn validate(&mut self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must not be 0");
        }

        if self.auth.jwt_secret.is_empty() {
            tracing::warn!(
                "No JWT secret configured; generating an ephemeral one. \
                 Tokens will not survive a restart."
            );
            self.auth.jwt_secret = generate_secret();
        } else if self.auth.jwt_secret.len() < 32 {
            anyhow::bail!("auth.jwt_secret must be at least 32 characters");
        }

        if let Some(ref tls) = self.server.tls {
            if !tls.cert_file.exists() {
                anyhow::bail!("TLS certificate file not found: {:?}", tls.cert_file);
            }
            if !tls.key_file.exists() {
                anyhow::bail!("TLS key file not found: {:?}", tls.key_file);
            }
        }

        Ok(())
    }
}

/// Generate a random 50-character secret
fn generate_secret() -> String {
    use rand::Rng;

    const CHARSET: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*()-_=+";
    let mut rng = rand::thread_rng();
    (0..50)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}
