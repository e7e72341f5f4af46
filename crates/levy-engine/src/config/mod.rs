use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

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
    pub levy: LevySettings,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            levy: LevySettings::load()?,
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Engine knobs: configured charge amounts and cache/locking windows.
///
/// Amounts are whole naira. The fee-cache TTL bounds how long a quoted daily
/// rate may lag a gazette update; boundary data has no TTL and is invalidated
/// explicitly on edit.
#[derive(Debug, Clone)]
pub struct LevySettings {
    pub off_route_surcharge: u64,
    pub device_fee_daily: u64,
    pub fee_cache_ttl: Duration,
    pub wallet_lock_timeout: Duration,
    pub tariff_csv: Option<PathBuf>,
}

impl LevySettings {
    fn load() -> Result<Self, ConfigError> {
        let off_route_surcharge = parse_amount("LEVY_OFF_ROUTE_SURCHARGE", 1_000)?;
        let device_fee_daily = parse_amount("LEVY_DEVICE_FEE_DAILY", 50)?;

        let fee_cache_ttl_secs = parse_amount("LEVY_FEE_CACHE_TTL_SECS", 300)?;
        let wallet_lock_timeout_ms = parse_amount("LEVY_WALLET_LOCK_TIMEOUT_MS", 250)?;

        let tariff_csv = env::var("LEVY_TARIFF_CSV").ok().map(PathBuf::from);

        Ok(Self {
            off_route_surcharge,
            device_fee_daily,
            fee_cache_ttl: Duration::from_secs(fee_cache_ttl_secs),
            wallet_lock_timeout: Duration::from_millis(wallet_lock_timeout_ms),
            tariff_csv,
        })
    }
}

impl Default for LevySettings {
    fn default() -> Self {
        Self {
            off_route_surcharge: 1_000,
            device_fee_daily: 50,
            fee_cache_ttl: Duration::from_secs(300),
            wallet_lock_timeout: Duration::from_millis(250),
            tariff_csv: None,
        }
    }
}

fn parse_amount(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidAmount { key }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidAmount { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidAmount { key } => {
                write!(f, "{key} must be a non-negative whole number")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidAmount { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("LEVY_OFF_ROUTE_SURCHARGE");
        env::remove_var("LEVY_DEVICE_FEE_DAILY");
        env::remove_var("LEVY_FEE_CACHE_TTL_SECS");
        env::remove_var("LEVY_WALLET_LOCK_TIMEOUT_MS");
        env::remove_var("LEVY_TARIFF_CSV");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.levy.off_route_surcharge, 1_000);
        assert_eq!(config.levy.fee_cache_ttl, Duration::from_secs(300));
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn rejects_non_numeric_surcharge() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LEVY_OFF_ROUTE_SURCHARGE", "plenty");
        match AppConfig::load() {
            Err(ConfigError::InvalidAmount { key }) => {
                assert_eq!(key, "LEVY_OFF_ROUTE_SURCHARGE")
            }
            other => panic!("expected InvalidAmount, got {other:?}"),
        }
        env::remove_var("LEVY_OFF_ROUTE_SURCHARGE");
    }
}
