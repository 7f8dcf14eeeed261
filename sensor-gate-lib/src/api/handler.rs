//! Request entry point: gate first, then dispatch.
//!
//! The route table only decides which [`Requirement`](crate::security::Requirement)
//! the gatekeeper must confirm. Path parameters and query strings are looked at
//! after the request has been permitted.

use http::header::AUTHORIZATION;
use http::{Request, StatusCode};
use hyper::Response;
use serde_json::json;
use std::net::SocketAddr;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::info;

use crate::api::context::AppContext;
use crate::api::http_result::{HttpError, HttpResult};
use crate::api::routes::{resolve, Operation, Period};
use crate::api::synthetic_response::{
    deny_response, error_response, json_response, metrics_response, RespBody,
};
use crate::security::{ClientAddress, Credential, Decision, GateRequest, Principal};
use crate::store::NewReading;

pub const MIN_READING: f64 = 0.0;
pub const MAX_READING: f64 = 50.0;
pub const DEFAULT_PER_PAGE: usize = 100;
pub const MAX_PER_PAGE: usize = 1000;

/// Gate and answer a single request from `peer`.
///
/// Never fails: denials and handler errors are turned into JSON responses.
pub fn handle_request<B>(req: &Request<B>, peer: SocketAddr, ctx: &AppContext) -> Response<RespBody> {
    let start = Instant::now();
    let operation = resolve(req.method(), req.uri().path());
    let client = ClientAddress::from(peer).to_string();

    let credential = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(Credential::from_authorization_header);

    let gate_request = GateRequest {
        address: &client,
        credential: credential.as_ref(),
        requirement: operation.requirement(),
    };
    let verdict = ctx.gatekeeper.evaluate(&gate_request, start);

    let response = match verdict.decision {
        Decision::Deny(reason) => {
            deny_response(reason, &ctx.gatekeeper.challenge(), verdict.retry_after)
        }
        Decision::Permit(principal) => {
            match dispatch(&operation, req.uri().query(), &client, &principal, ctx) {
                Ok(resp) => resp,
                Err(e) => error_response(&e),
            }
        }
    };

    if let Some(m) = &ctx.metrics {
        m.record_request(
            req.method().as_str(),
            response.status().as_u16(),
            operation.label(),
            start.elapsed().as_secs_f64(),
        );
    }

    response
}

fn dispatch(
    operation: &Operation,
    query: Option<&str>,
    client: &str,
    principal: &Principal,
    ctx: &AppContext,
) -> HttpResult<Response<RespBody>> {
    match operation {
        Operation::IngestReading => ingest_reading(query, client, principal, ctx),
        Operation::ListReadings => list_readings(query, ctx),
        Operation::PeriodReadings(period) => period_readings(period, ctx),
        Operation::DeleteReading(id) => delete_reading(id, principal, ctx),
        Operation::Metrics => match &ctx.registry {
            Some(registry) => Ok(metrics_response(registry)?),
            None => Err(HttpError::NotFound),
        },
        Operation::MethodNotAllowed => Err(HttpError::MethodNotAllowed),
        Operation::NotFound => Err(HttpError::NotFound),
    }
}

fn ingest_reading(
    query: Option<&str>,
    client: &str,
    principal: &Principal,
    ctx: &AppContext,
) -> HttpResult<Response<RespBody>> {
    let value = query_param(query, "reading")
        .and_then(|raw| raw.parse::<f64>().ok())
        .ok_or_else(|| {
            HttpError::BadRequest(
                "Missing or invalid reading parameter. Must be a float value.".to_string(),
            )
        })?;

    // NaN fails the range check too
    if !(MIN_READING..=MAX_READING).contains(&value) {
        return Err(HttpError::BadRequest(
            "Reading value must be between 0.0 and 50.0".to_string(),
        ));
    }

    let mode = match query_param(query, "m") {
        None => None,
        Some(raw) => match raw.parse::<u8>() {
            Ok(m @ (0 | 1)) => Some(m),
            _ => {
                return Err(HttpError::BadRequest(
                    "Mode parameter (m) must be either 0 or 1".to_string(),
                ))
            }
        },
    };

    let reading = ctx.store.insert(NewReading {
        value,
        mode,
        source_ip: client.to_string(),
        recorded_at: SystemTime::now(),
    });

    info!(
        id = reading.id,
        value,
        mode = ?mode,
        client = %client,
        identifier = %principal.identifier,
        "reading stored"
    );
    if let Some(m) = &ctx.metrics {
        m.record_reading_ingested();
    }

    Ok(json_response(
        StatusCode::CREATED,
        &json!({
            "message": "Reading saved successfully",
            "reading": reading,
        }),
    )?)
}

fn list_readings(query: Option<&str>, ctx: &AppContext) -> HttpResult<Response<RespBody>> {
    let page = query_param(query, "page")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(1)
        .max(1);
    let per_page = query_param(query, "per_page")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);

    let page = ctx.store.page(page, per_page);
    let body = serde_json::to_value(&page)
        .map_err(|e| HttpError::Internal(format!("Failed to serialize readings: {e}")))?;
    Ok(json_response(StatusCode::OK, &body)?)
}

fn period_readings(period: &str, ctx: &AppContext) -> HttpResult<Response<RespBody>> {
    let Some(period) = Period::parse(period) else {
        let valid: Vec<&str> = Period::ALL.iter().map(Period::as_str).collect();
        return Err(HttpError::BadRequest(format!(
            "Invalid period. Must be one of: {}",
            valid.join(", ")
        )));
    };

    let span = Duration::from_secs(period.hours().saturating_mul(3600));
    let start = SystemTime::now().checked_sub(span).unwrap_or(UNIX_EPOCH);
    let readings = ctx.store.since(start);

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "period": period.as_str(),
            "hours": period.hours(),
            "count": readings.len(),
            "readings": readings,
        }),
    )?)
}

fn delete_reading(
    id: &str,
    principal: &Principal,
    ctx: &AppContext,
) -> HttpResult<Response<RespBody>> {
    let id = id.parse::<u64>().map_err(|_| HttpError::NotFound)?;
    if !ctx.store.delete(id) {
        return Err(HttpError::NotFound);
    }

    info!(id, identifier = %principal.identifier, "reading deleted");
    Ok(json_response(
        StatusCode::OK,
        &json!({ "message": "Reading deleted", "id": id }),
    )?)
}

/// First value of `name` in a raw query string. A key without `=` has an empty value.
fn query_param<'a>(query: Option<&'a str>, name: &str) -> Option<&'a str> {
    query?
        .split('&')
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}
