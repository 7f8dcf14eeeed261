#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod security;
pub mod store;
pub mod telemetry;

pub use api::{run, serve, AppContext};
pub use config::{load_from_env, load_from_path, Config};
pub use error::{GateError, Result};
pub use security::{Decision, DenyReason, GateRequest, Gatekeeper, Requirement};
pub use store::{MemoryStore, ReadingStore};
