//! Application configuration.
//!
//! Every value comes from the environment, with defaults suitable for a
//! single-host deployment.

use std::time::Duration;

/// Default location of the connection registry.
pub const DEFAULT_REGISTRY_URL: &str = "sqlite://db_gateway.sqlite3";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8090;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 60;

/// Runtime configuration shared by the CLI and the tool server.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Name used in log lines and response metadata.
    pub service_name: String,
    /// Bind address of the tool server.
    pub host: String,
    /// Bind port of the tool server.
    pub port: u16,
    /// sqlx URL of the connection registry database.
    pub registry_url: String,
    /// Upper bound on establishing a connection to a target engine.
    pub connect_timeout_secs: u64,
    /// Upper bound on a whole query call, connection setup included.
    pub query_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "db-gateway".to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    /// Loads configuration from the environment for the named service.
    ///
    /// Recognised variables: `SERVER_HOST`, `SERVER_PORT`, `REGISTRY_URL`,
    /// `CONNECT_TIMEOUT_SECS`, `QUERY_TIMEOUT_SECS`. Unparseable numbers fall
    /// back to their defaults.
    pub fn load_with_service(service_name: &str) -> Self {
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    fn from_lookup<F>(service_name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let number = |key: &str, fallback: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(fallback)
        };

        Self {
            service_name: service_name.to_string(),
            host: lookup("SERVER_HOST").unwrap_or(defaults.host),
            port: lookup("SERVER_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.port),
            registry_url: lookup("REGISTRY_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.registry_url),
            connect_timeout_secs: number("CONNECT_TIMEOUT_SECS", defaults.connect_timeout_secs),
            query_timeout_secs: number("QUERY_TIMEOUT_SECS", defaults.query_timeout_secs),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Socket address string for the tool server.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
