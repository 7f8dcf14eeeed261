use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE, RETRY_AFTER, WWW_AUTHENTICATE};
use http::StatusCode;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::Response;
use prometheus::{Encoder, Registry, TextEncoder};
use serde_json::json;
use std::time::Duration;
use tracing::error;

use crate::api::http_result::HttpError;
use crate::error::{GateError, Result};
use crate::security::DenyReason;

pub type RespBody = BoxBody<Bytes, hyper::Error>;

/// Build a JSON response with the given status
pub(crate) fn json_response(
    status: StatusCode,
    value: &serde_json::Value,
) -> Result<Response<RespBody>> {
    let body_bytes = serde_json::to_vec(value)
        .map_err(|e| GateError::Http(format!("Failed to serialize response: {e}")))?;

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(full_body(body_bytes))
        .map_err(|e| GateError::Http(format!("Failed to build response: {e}")))
}

/// Prometheus text exposition of everything in `registry`
pub(crate) fn metrics_response(registry: &Registry) -> Result<Response<RespBody>> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .map_err(|e| GateError::Http(format!("Failed to encode metrics: {e}")))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, encoder.format_type())
        .body(full_body(buffer))
        .map_err(|e| GateError::Http(format!("Failed to build response: {e}")))
}

/// Response for a gatekeeper denial.
///
/// `Unauthenticated` carries the `WWW-Authenticate` challenge, `RateLimited`
/// carries `Retry-After` in whole seconds (rounded up).
pub(crate) fn deny_response(
    reason: DenyReason,
    challenge: &str,
    retry_after: Option<Duration>,
) -> Response<RespBody> {
    let mut resp = error_body(reason.status_code(), reason.public_message());

    match reason {
        DenyReason::Unauthenticated => {
            if let Ok(hv) = HeaderValue::from_str(challenge) {
                resp.headers_mut().insert(WWW_AUTHENTICATE, hv);
            }
        }
        DenyReason::RateLimited => {
            if let Some(wait) = retry_after {
                let secs = wait.as_secs().saturating_add(u64::from(wait.subsec_nanos() > 0));
                resp.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs.max(1)));
            }
        }
        DenyReason::AddressNotAllowed | DenyReason::Forbidden => {}
    }

    resp
}

/// Response for a failure after the request was permitted
pub(crate) fn error_response(err: &HttpError) -> Response<RespBody> {
    if let HttpError::Internal(detail) = err {
        error!(error = %detail, "request failed");
    }
    error_body(StatusCode::from(err), &err.public_message())
}

fn error_body(status: StatusCode, message: &str) -> Response<RespBody> {
    match json_response(status, &json!({ "error": message })) {
        Ok(resp) => resp,
        Err(e) => {
            error!(error = %e, "failed to build error response");
            let mut resp = Response::new(empty_body());
            *resp.status_mut() = status;
            resp
        }
    }
}

fn full_body(bytes: Vec<u8>) -> RespBody {
    Full::new(Bytes::from(bytes))
        .map_err(|never| match never {})
        .boxed()
}

fn empty_body() -> RespBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}
