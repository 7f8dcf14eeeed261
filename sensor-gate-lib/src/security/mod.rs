//! Access control for every inbound request.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → allow_list.rs    (is the client network permitted at all?)
//!     → rate_limit/      (has this address exhausted its window budget?)
//!     → authenticator.rs (do the Basic credentials name a known principal?)
//!     → authorizer.rs    (does the principal hold the required role?)
//!     → Permit(principal) handed to the route handler
//! ```
//!
//! `gatekeeper.rs` runs these in that fixed order and stops at the first
//! failure.

pub mod address;
pub mod allow_list;
pub mod authenticator;
pub mod authorizer;
pub mod credentials;
pub mod gatekeeper;
pub mod rate_limit;

pub use address::ClientAddress;
pub use allow_list::{parse_network, AllowList};
pub use authenticator::{Authenticator, DEFAULT_REALM};
pub use authorizer::{Authorizer, Requirement};
pub use credentials::{Credential, CredentialStore, Principal, Role, SecretDigest};
pub use gatekeeper::{Decision, DenyReason, GateRequest, Gatekeeper, Verdict};
pub use rate_limit::{RateLimitResult, RateLimiter};
