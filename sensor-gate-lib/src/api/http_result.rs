use http::StatusCode;
use thiserror::Error;

use crate::error::GateError;

/// HTTP result type, T is typically a hyper::Response
/// HttpError is turned into a synthetic JSON error response
pub(crate) type HttpResult<T> = std::result::Result<T, HttpError>;

/// Describes things that can go wrong after the gatekeeper permitted a request
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HttpError {
    /// Client input failed validation. The message is returned to the client.
    #[error("{0}")]
    BadRequest(String),

    #[error("Not found")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Internal failure. The detail is logged, never returned.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HttpError {
    /// Message safe to put in a response body
    pub fn public_message(&self) -> String {
        match self {
            HttpError::BadRequest(msg) => msg.clone(),
            HttpError::NotFound => "Not found".to_string(),
            HttpError::MethodNotAllowed => "Method not allowed".to_string(),
            HttpError::Internal(_) => {
                "An error occurred while processing your request".to_string()
            }
        }
    }
}

impl From<&HttpError> for StatusCode {
    fn from(e: &HttpError) -> StatusCode {
        match e {
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::NotFound => StatusCode::NOT_FOUND,
            HttpError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GateError> for HttpError {
    fn from(e: GateError) -> Self {
        HttpError::Internal(e.to_string())
    }
}
