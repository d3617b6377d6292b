use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_DIRECTORY_PAGE_SIZE: u32 = 50;
const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;

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
    pub gateway: GatewayConfig,
    pub sessions: SessionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let gateway = GatewayConfig::from_env()?;

        let idle_ttl_secs = match env::var("WIZARD_SESSION_TTL_SECS") {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => return Err(ConfigError::InvalidSessionTtl),
            },
            Err(_) => DEFAULT_SESSION_TTL_SECS,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            gateway,
            sessions: SessionConfig {
                idle_ttl: Duration::from_secs(idle_ttl_secs),
            },
        })
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Wizard sessions untouched for `idle_ttl` are dropped with their drafts.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub idle_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        }
    }
}

/// Where the domestic-work backend lives and how patiently we talk to it.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub directory_page_size: u32,
}

impl GatewayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = env::var("DOMESTIC_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            .trim()
            .trim_end_matches('/')
            .to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl { value: base_url });
        }

        let timeout_secs = match env::var("DOMESTIC_API_TIMEOUT_SECS") {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => return Err(ConfigError::InvalidTimeout),
            },
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let directory_page_size = match env::var("DIRECTORY_PAGE_SIZE") {
            Ok(raw) => match raw.trim().parse::<u32>() {
                Ok(size) if size > 0 => size,
                _ => return Err(ConfigError::InvalidPageSize),
            },
            Err(_) => DEFAULT_DIRECTORY_PAGE_SIZE,
        };

        Ok(Self {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
            directory_page_size,
        })
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            directory_page_size: DEFAULT_DIRECTORY_PAGE_SIZE,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidBaseUrl { value: String },
    InvalidTimeout,
    InvalidPageSize,
    InvalidSessionTtl,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidBaseUrl { value } => write!(
                f,
                "DOMESTIC_API_BASE_URL must be an http(s) URL, got '{}'",
                value
            ),
            ConfigError::InvalidTimeout => {
                write!(f, "DOMESTIC_API_TIMEOUT_SECS must be a positive integer")
            }
            ConfigError::InvalidPageSize => {
                write!(f, "DIRECTORY_PAGE_SIZE must be a positive integer")
            }
            ConfigError::InvalidSessionTtl => {
                write!(f, "WIZARD_SESSION_TTL_SECS must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidBaseUrl { .. }
            | ConfigError::InvalidTimeout
            | ConfigError::InvalidPageSize
            | ConfigError::InvalidSessionTtl => None,
        }
    }
}
