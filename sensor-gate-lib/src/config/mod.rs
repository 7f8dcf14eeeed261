mod loader;
mod root;
mod security;
mod telemetry;
mod timeout;
mod validator;

pub use loader::{load_from_env, load_from_path, logging_from_env, read_from_env, read_from_path};
pub use root::Config;
pub use security::{
    PrincipalConfig, RateLimitConfig, SecurityConfig, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECONDS,
    MAX_WINDOW_SECONDS,
};
pub use telemetry::LoggingConfig;
pub use timeout::TimeoutConfig;
pub use validator::validate;
