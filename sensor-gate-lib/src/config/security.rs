use serde::Deserialize;
use std::fmt;

use crate::security::Role;

pub const DEFAULT_WINDOW_SECONDS: u64 = 60;
pub const DEFAULT_MAX_REQUESTS: u32 = 10;
/// Longest accepted rate limit window, one day
pub const MAX_WINDOW_SECONDS: u64 = 86_400;

/// Security configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct SecurityConfig {
    /// Networks allowed to reach the service.
    /// Supports CIDR notation and bare addresses: ["10.0.0.0/8", "192.168.1.7", "::1/128"]
    /// Empty list = no restriction.
    ///
    /// Entries are kept as raw strings here; invalid ones are logged and skipped
    /// when the allow-list is built, so one bad entry never rejects the file.
    #[serde(default)]
    pub allowed_networks: Vec<String>,
    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Known principals
    #[serde(default)]
    pub principals: Vec<PrincipalConfig>,
}

/// Sliding-window rate limiting configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Length of the trailing window in seconds
    /// Default: 60
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Maximum requests admitted per address within one window
    /// Default: 10
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Run an eviction sweep of idle addresses every N evaluated requests.
    /// 0 disables the request-triggered sweep (the periodic server sweep still runs).
    /// Default: 1024
    #[serde(default = "default_sweep_every")]
    pub sweep_every: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_seconds: default_window_seconds(),
            max_requests: default_max_requests(),
            sweep_every: default_sweep_every(),
        }
    }
}

/// A principal definition: identifier, plaintext secret and role
#[derive(Deserialize, Clone, PartialEq)]
pub struct PrincipalConfig {
    /// Unique, case-sensitive identifier (the Basic auth username)
    pub identifier: String,
    /// Secret (the Basic auth password). Digested when the credential store is built.
    pub secret: String,
    /// "administrator" or "viewer"
    pub role: Role,
}

impl fmt::Debug for PrincipalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrincipalConfig")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

fn default_window_seconds() -> u64 {
    DEFAULT_WINDOW_SECONDS
}

fn default_max_requests() -> u32 {
    DEFAULT_MAX_REQUESTS
}

fn default_sweep_every() -> u64 {
    1024
}
