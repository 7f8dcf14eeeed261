//! Per-client rate limiting.
//!
//! A classic sliding-window counter: every address keeps the timestamps of its
//! admitted requests within the trailing window. Bursts are allowed up to the
//! configured maximum inside any rolling window; there are no fixed reset
//! boundaries and no token refill.
//!
//! # Configuration
//!
//! ```toml
//! [security.rate_limit]
//! window_seconds = 60
//! max_requests = 10
//! sweep_every = 1024
//! ```
//!
//! # Example Usage
//!
//! ```
//! use sensor_gate_lib::security::rate_limit::RateLimiter;
//! use sensor_gate_lib::security::ClientAddress;
//! use std::time::{Duration, Instant};
//!
//! let limiter = RateLimiter::new(10, Duration::from_secs(60));
//! let client: ClientAddress = "192.168.1.1".parse().unwrap();
//! assert!(limiter.allow(&client, Instant::now()).is_allowed());
//! ```

mod limiter;

pub use limiter::{RateLimitResult, RateLimiter};
