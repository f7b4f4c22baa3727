use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::workflows::applicant::WizardPolicy;

pub const DEFAULT_LOOKUP_URL: &str = "https://viacep.com.br/ws";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;

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

/// Top-level configuration for the wizard service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub lookup: LookupConfig,
    pub sessions: SessionConfig,
    pub wizard: WizardPolicy,
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

        let lookup = LookupConfig {
            base_url: env::var("APP_LOOKUP_URL")
                .unwrap_or_else(|_| DEFAULT_LOOKUP_URL.to_string()),
            timeout_ms: number("APP_LOOKUP_TIMEOUT_MS", 5_000)?,
        };

        let sessions = SessionConfig {
            idle_ttl_secs: number("APP_WIZARD_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
        };

        let defaults = WizardPolicy::default();
        let wizard = WizardPolicy {
            lock_resolved_address: flag(
                "APP_WIZARD_LOCK_RESOLVED_ADDRESS",
                defaults.lock_resolved_address,
            )?,
            require_address_lookup: flag(
                "APP_WIZARD_REQUIRE_LOOKUP",
                defaults.require_address_lookup,
            )?,
            enforce_password_strength: flag(
                "APP_WIZARD_ENFORCE_PASSWORD_STRENGTH",
                defaults.enforce_password_strength,
            )?,
            require_course_name: flag(
                "APP_WIZARD_REQUIRE_COURSE_NAME",
                defaults.require_course_name,
            )?,
            minimum_age: number("APP_WIZARD_MINIMUM_AGE", u64::from(defaults.minimum_age))?
                .try_into()
                .map_err(|_| ConfigError::InvalidNumber {
                    name: "APP_WIZARD_MINIMUM_AGE",
                })?,
            reference_year: None,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
            },
            lookup,
            sessions,
            wizard,
        })
    }
}

fn flag(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { name }),
        },
    }
}

fn number(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { name }),
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
    pub ansi: bool,
}

/// Postal-code lookup endpoint.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl LookupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Lifetime of abandoned wizard sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub idle_ttl_secs: u64,
}

impl SessionConfig {
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidFlag { name: &'static str },
    InvalidNumber { name: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidFlag { name } => {
                write!(f, "{name} must be one of true/false/1/0/yes/no/on/off")
            }
            ConfigError::InvalidNumber { name } => {
                write!(f, "{name} must be a non-negative integer in range")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidFlag { .. }
            | ConfigError::InvalidNumber { .. } => None,
        }
    }
}
