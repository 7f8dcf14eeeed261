use serde::Deserialize;
use std::net::SocketAddr;

use super::security::SecurityConfig;
use super::telemetry::LoggingConfig;
use super::timeout::TimeoutConfig;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address and port to listen on
    /// Example: "0.0.0.0:5001" or "127.0.0.1:8080"
    pub listen: SocketAddr,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Timeout configuration
    #[serde(default)]
    pub timeout: TimeoutConfig,
    /// Access control: allowed networks, rate limiting and principals
    #[serde(default)]
    pub security: SecurityConfig,
}

impl Config {
    /// Configuration with every section at its default, listening on `listen`
    pub fn with_listen(listen: SocketAddr) -> Self {
        Self {
            listen,
            logging: LoggingConfig::default(),
            timeout: TimeoutConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}
