use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use tracing::warn;

use crate::config::{validate, Config, LoggingConfig, PrincipalConfig};
use crate::error::{GateError, Result};
use crate::security::Role;

const DEFAULT_PORT: u16 = 5001;

/// Load configuration from a TOML file.
///
/// Only unreadable files and TOML syntax/type errors fail; everything else is
/// repaired by [`validate`].
pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let mut cfg = read_from_path(p)?;
    validate(&mut cfg);
    Ok(cfg)
}

/// Parse a TOML file without running [`validate`].
///
/// Lets the caller install logging from the parsed `[logging]` section before
/// validation warnings are emitted.
pub fn read_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| GateError::Config(format!("Failed to read config file: {e}")))?;
    toml::from_str(&txt).map_err(|e| GateError::Config(format!("Failed to parse config: {e}")))
}

/// Build configuration from process environment variables.
///
/// | Variable | Meaning |
/// |---|---|
/// | `API_USERNAME` / `API_PASSWORD` | administrator principal |
/// | `VIEWER_USERNAME` / `VIEWER_PASSWORD` | viewer principal |
/// | `RATE_LIMIT_WINDOW` | window in seconds (60) |
/// | `MAX_REQUESTS` | requests per window (10) |
/// | `ALLOWED_IPS` | comma-separated networks (none) |
/// | `PORT` | listen port on 0.0.0.0 (5001) |
/// | `LOG_LEVEL` | log level (info) |
pub fn load_from_env() -> Config {
    load_from_lookup(|key| std::env::var(key).ok())
}

/// Environment counterpart of [`read_from_path`]
///
/// Reading the environment can itself warn, so install logging from
/// [`logging_from_env`] first.
pub fn read_from_env() -> Config {
    read_from_lookup(|key| std::env::var(key).ok())
}

/// Logging settings from `LOG_LEVEL`, readable before any subscriber exists
pub fn logging_from_env() -> LoggingConfig {
    logging_from_lookup(|key| std::env::var(key).ok())
}

fn logging_from_lookup<F>(lookup: F) -> LoggingConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut logging = LoggingConfig::default();
    if let Some(level) = lookup("LOG_LEVEL").map(|v| v.trim().to_string()) {
        if !level.is_empty() {
            logging.level = level;
        }
    }
    logging
}

pub(crate) fn load_from_lookup<F>(lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = read_from_lookup(lookup);
    validate(&mut cfg);
    cfg
}

fn read_from_lookup<F>(lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let port = parse_or_default(var("PORT"), "PORT", DEFAULT_PORT);
    let mut cfg = Config::with_listen(SocketAddr::from(([0, 0, 0, 0], port)));
    cfg.logging = logging_from_lookup(&lookup);

    let rate_limit = &mut cfg.security.rate_limit;
    rate_limit.window_seconds =
        parse_or_default(var("RATE_LIMIT_WINDOW"), "RATE_LIMIT_WINDOW", rate_limit.window_seconds);
    rate_limit.max_requests =
        parse_or_default(var("MAX_REQUESTS"), "MAX_REQUESTS", rate_limit.max_requests);

    if let Some(ranges) = var("ALLOWED_IPS") {
        cfg.security.allowed_networks = ranges
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }

    for (user_key, pass_key, role) in [
        ("API_USERNAME", "API_PASSWORD", Role::Administrator),
        ("VIEWER_USERNAME", "VIEWER_PASSWORD", Role::Viewer),
    ] {
        match (var(user_key), lookup(pass_key).filter(|s| !s.is_empty())) {
            (Some(identifier), Some(secret)) => {
                cfg.security.principals.push(PrincipalConfig { identifier, secret, role });
            }
            (Some(_), None) | (None, Some(_)) => {
                warn!(user_key, pass_key, "principal needs both variables set, ignored");
            }
            (None, None) => {}
        }
    }

    cfg
}

fn parse_or_default<T: FromStr + Copy + std::fmt::Display>(
    value: Option<String>,
    key: &str,
    default: T,
) -> T {
    match value {
        None => default,
        Some(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!(key, value = %raw, %default, "invalid numeric environment variable, using default");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::{Arc, Mutex, PoisonError};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_empty_environment() {
        let cfg = load_from_lookup(lookup_from(&[]));
        assert_eq!(cfg.listen.to_string(), "0.0.0.0:5001");
        assert_eq!(cfg.security.rate_limit.window_seconds, 60);
        assert_eq!(cfg.security.rate_limit.max_requests, 10);
        assert!(cfg.security.allowed_networks.is_empty());
        assert!(cfg.security.principals.is_empty());
    }

    #[test]
    fn test_principals_and_limits_from_environment() {
        let cfg = load_from_lookup(lookup_from(&[
            ("API_USERNAME", "admin"),
            ("API_PASSWORD", "pw1"),
            ("VIEWER_USERNAME", "viewer"),
            ("VIEWER_PASSWORD", "pw2"),
            ("RATE_LIMIT_WINDOW", "30"),
            ("MAX_REQUESTS", "5"),
            ("ALLOWED_IPS", "10.0.0.0/8, 192.168.1.0/24,,"),
            ("PORT", "8080"),
        ]));

        assert_eq!(cfg.listen.port(), 8080);
        assert_eq!(cfg.security.rate_limit.window_seconds, 30);
        assert_eq!(cfg.security.rate_limit.max_requests, 5);
        assert_eq!(cfg.security.allowed_networks, vec!["10.0.0.0/8", "192.168.1.0/24"]);
        assert_eq!(cfg.security.principals.len(), 2);
        assert_eq!(cfg.security.principals[0].identifier, "admin");
        assert_eq!(cfg.security.principals[0].role, Role::Administrator);
        assert_eq!(cfg.security.principals[1].identifier, "viewer");
        assert_eq!(cfg.security.principals[1].role, Role::Viewer);
    }

    #[test]
    fn test_invalid_numbers_keep_defaults() {
        let cfg = load_from_lookup(lookup_from(&[
            ("RATE_LIMIT_WINDOW", "sixty"),
            ("MAX_REQUESTS", "-3"),
            ("PORT", "99999"),
        ]));
        assert_eq!(cfg.security.rate_limit.window_seconds, 60);
        assert_eq!(cfg.security.rate_limit.max_requests, 10);
        assert_eq!(cfg.listen.port(), 5001);
    }

    #[test]
    fn test_half_defined_principal_is_ignored() {
        let cfg = load_from_lookup(lookup_from(&[("API_USERNAME", "admin")]));
        assert!(cfg.security.principals.is_empty());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap_or_else(PoisonError::into_inner)).into_owned()
        }
    }

    #[test]
    fn test_environment_warnings_reach_installed_subscriber() {
        let env = lookup_from(&[
            ("LOG_LEVEL", "warn"),
            ("API_USERNAME", "admin"),
            ("RATE_LIMIT_WINDOW", "sixty"),
        ]);

        // Logging settings come first and never warn
        let logging = logging_from_lookup(&env);
        assert_eq!(logging.level, "warn");

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new(&logging.level))
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let cfg = tracing::subscriber::with_default(subscriber, || read_from_lookup(&env));

        assert_eq!(cfg.logging.level, "warn");
        let text = logs.text();
        assert!(text.contains("principal needs both variables set, ignored"), "{text}");
        assert!(text.contains("invalid numeric environment variable, using default"), "{text}");
        assert!(text.contains("RATE_LIMIT_WINDOW"), "{text}");
    }

    #[test]
    fn test_logging_from_lookup_defaults_to_info() {
        assert_eq!(logging_from_lookup(lookup_from(&[])).level, "info");
        assert_eq!(logging_from_lookup(lookup_from(&[("LOG_LEVEL", "  ")])).level, "info");
        assert_eq!(logging_from_lookup(lookup_from(&[("LOG_LEVEL", "debug")])).level, "debug");
    }
}
