//! HTTP route layer in front of the reading store.
//!
//! Every request is evaluated by the [`Gatekeeper`](crate::security::Gatekeeper)
//! before the route table is consulted for anything but its requirement.

pub mod context;
pub mod handler;
pub mod http_result;
pub mod routes;
pub mod server;
pub mod synthetic_response;

pub use context::AppContext;
pub use handler::handle_request;
pub use routes::{resolve, Operation, Period};
pub use server::{run, serve};
pub use synthetic_response::RespBody;
