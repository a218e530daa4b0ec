use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const ENV_BIND: &str = "NAV_DASHBOARD_BIND";
pub const ENV_PORT: &str = "NAV_DASHBOARD_PORT";
pub const ENV_DB: &str = "NAV_DASHBOARD_DB";
pub const ENV_REMOTE_TIMEOUT: &str = "NAV_DASHBOARD_REMOTE_TIMEOUT_SECS";
pub const ENV_LOG_JSON: &str = "NAV_DASHBOARD_LOG_JSON";

/// Process configuration, read once at startup from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub database_path: PathBuf,
    pub remote_timeout: Duration,
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            database_path: default_database_path(),
            remote_timeout: Duration::from_secs(30),
            log_json: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparseable values fall back
    /// to the default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            bind: parse_or(&lookup, ENV_BIND, defaults.bind),
            port: parse_or(&lookup, ENV_PORT, defaults.port),
            database_path: lookup(ENV_DB)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            remote_timeout: Duration::from_secs(parse_or(
                &lookup,
                ENV_REMOTE_TIMEOUT,
                defaults.remote_timeout.as_secs(),
            )),
            log_json: lookup(ENV_LOG_JSON)
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(defaults.log_json),
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("ignoring invalid {}={:?}", key, raw);
            default
        }),
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nav-dashboard")
        .join("nav.db")
}
