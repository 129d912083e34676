use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::gateway::RetryPolicy;
use crate::workflows::certificate::WorkflowSettings;
use crate::workflows::origin::{TradeBloc, DEFAULT_THRESHOLD};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub trust_api: TrustApiConfig,
    pub origin: OriginConfig,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn millis(key: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidDuration { key, value: raw }),
        Err(_) => Ok(Duration::from_millis(default)),
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&var_or("APP_ENV", "development"));

        let host = var_or("APP_HOST", "127.0.0.1");
        let port = var_or("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = var_or("APP_LOG_LEVEL", "info");
        let format = LogFormat::parse(&var_or("APP_LOG_FORMAT", "compact"))?;

        let base_url = match env::var("TRUST_API_BASE_URL") {
            Ok(raw) if !raw.trim().is_empty() => {
                let trimmed = raw.trim();
                if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                    return Err(ConfigError::InvalidBaseUrl(raw));
                }
                Some(trimmed.trim_end_matches('/').to_string())
            }
            _ => None,
        };
        let trust_api = TrustApiConfig {
            base_url,
            timeout: millis("TRUST_API_TIMEOUT_MS", 8_000)?,
            retry_backoff: millis("TRUST_API_RETRY_BACKOFF_MS", 250)?,
        };

        let trade_bloc = TradeBloc::parse_list(&var_or("USMCA_TRADE_BLOC", "US,CA,MX"));
        if trade_bloc.is_empty() {
            return Err(ConfigError::EmptyTradeBloc);
        }
        let default_threshold = match env::var("USMCA_DEFAULT_THRESHOLD") {
            Ok(raw) => match raw.trim().parse::<f64>() {
                Ok(value) if (0.0..=100.0).contains(&value) => value,
                _ => return Err(ConfigError::InvalidThreshold(raw)),
            },
            Err(_) => DEFAULT_THRESHOLD,
        };
        let archive_dir = PathBuf::from(var_or("SESSION_ARCHIVE_DIR", "data/sessions"));

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level, format },
            trust_api,
            origin: OriginConfig {
                trade_bloc,
                default_threshold,
                archive_dir,
            },
        })
    }

    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            bloc: self.origin.trade_bloc.clone(),
            default_threshold: self.origin.default_threshold,
            read_policy: self.trust_api.read_policy(),
            generate_policy: self.trust_api.generate_policy(),
        }
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Full,
}

impl LogFormat {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "full" | "pretty" => Ok(Self::Full),
            _ => Err(ConfigError::InvalidLogFormat(value.to_string())),
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

/// Outbound trust API. Without a base URL the offline rulebook and local issuer are used.
#[derive(Debug, Clone)]
pub struct TrustApiConfig {
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub retry_backoff: Duration,
}

impl TrustApiConfig {
    pub fn read_policy(&self) -> RetryPolicy {
        RetryPolicy::idempotent(self.timeout, self.retry_backoff)
    }

    pub fn generate_policy(&self) -> RetryPolicy {
        RetryPolicy::single_attempt(self.timeout)
    }
}

#[derive(Debug, Clone)]
pub struct OriginConfig {
    pub trade_bloc: TradeBloc,
    pub default_threshold: f64,
    pub archive_dir: PathBuf,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLogFormat(String),
    InvalidBaseUrl(String),
    InvalidDuration { key: &'static str, value: String },
    InvalidThreshold(String),
    EmptyTradeBloc,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLogFormat(value) => {
                write!(f, "APP_LOG_FORMAT must be 'compact' or 'full', got '{value}'")
            }
            ConfigError::InvalidBaseUrl(value) => {
                write!(f, "TRUST_API_BASE_URL must be an http(s) URL, got '{value}'")
            }
            ConfigError::InvalidDuration { key, value } => {
                write!(f, "{key} must be a whole number of milliseconds, got '{value}'")
            }
            ConfigError::InvalidThreshold(value) => {
                write!(f, "USMCA_DEFAULT_THRESHOLD must be between 0 and 100, got '{value}'")
            }
            ConfigError::EmptyTradeBloc => {
                write!(f, "USMCA_TRADE_BLOC must name at least one country")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
