use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::header::{AUTHORIZATION, RETRY_AFTER, WWW_AUTHENTICATE};
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use hyper::Response;
use sensor_gate_lib::api::{handle_request, AppContext, RespBody};
use sensor_gate_lib::config::{PrincipalConfig, RateLimitConfig, SecurityConfig};
use sensor_gate_lib::security::{Gatekeeper, Role};
use sensor_gate_lib::store::{MemoryStore, NewReading, ReadingStore};
use sensor_gate_lib::telemetry::init_metrics;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const PEER: &str = "10.0.0.1:40000";

fn context(networks: &[&str], max_requests: u32) -> (AppContext, Arc<MemoryStore>) {
    let security = SecurityConfig {
        allowed_networks: networks.iter().map(|s| s.to_string()).collect(),
        rate_limit: RateLimitConfig { window_seconds: 60, max_requests, sweep_every: 0 },
        principals: vec![
            PrincipalConfig {
                identifier: "admin".to_string(),
                secret: "admin-secret".to_string(),
                role: Role::Administrator,
            },
            PrincipalConfig {
                identifier: "viewer".to_string(),
                secret: "viewer-secret".to_string(),
                role: Role::Viewer,
            },
        ],
    };
    let store = Arc::new(MemoryStore::new());
    let ctx = AppContext::new(Gatekeeper::from_config(&security), store.clone());
    (ctx, store)
}

fn basic(identifier: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{identifier}:{secret}")))
}

fn get(uri: &str, auth: Option<(&str, &str)>) -> Result<Request<()>, http::Error> {
    request(Method::GET, uri, auth)
}

fn request(method: Method, uri: &str, auth: Option<(&str, &str)>) -> Result<Request<()>, http::Error> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((identifier, secret)) = auth {
        builder = builder.header(AUTHORIZATION, basic(identifier, secret));
    }
    builder.body(())
}

fn peer() -> Result<SocketAddr, std::net::AddrParseError> {
    PEER.parse()
}

async fn json_body(resp: Response<RespBody>) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
    let bytes = resp.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}

const ADMIN: Option<(&str, &str)> = Some(("admin", "admin-secret"));
const VIEWER: Option<(&str, &str)> = Some(("viewer", "viewer-secret"));

#[tokio::test]
async fn test_missing_credentials_get_challenge() -> TestResult {
    let (ctx, _) = context(&[], 10);

    let resp = handle_request(&get("/readings", None)?, peer()?, &ctx);

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers().get(WWW_AUTHENTICATE).map(|v| v.as_bytes()),
        Some(br#"Basic realm="Sensor API""#.as_slice())
    );
    let body = json_body(resp).await?;
    assert_eq!(body["error"], "Authentication required");
    Ok(())
}

#[tokio::test]
async fn test_unknown_path_requires_authentication_first() -> TestResult {
    let (ctx, _) = context(&[], 10);

    let anonymous = handle_request(&get("/admin/secret", None)?, peer()?, &ctx);
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let authenticated = handle_request(&get("/admin/secret", VIEWER)?, peer()?, &ctx);
    assert_eq!(authenticated.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_address_outside_allow_list_is_forbidden() -> TestResult {
    let (ctx, _) = context(&["192.168.0.0/16"], 10);

    let resp = handle_request(&get("/readings", ADMIN)?, peer()?, &ctx);

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = json_body(resp).await?;
    assert_eq!(body["error"], "Access denied");
    Ok(())
}

#[tokio::test]
async fn test_viewer_cannot_ingest() -> TestResult {
    let (ctx, store) = context(&[], 10);

    let resp = handle_request(&get("/measure?reading=12.5", VIEWER)?, peer()?, &ctx);

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(store.is_empty());
    let body = json_body(resp).await?;
    assert_eq!(body["error"], "Access denied. Admin privileges required.");
    Ok(())
}

#[tokio::test]
async fn test_rate_limited_response_carries_retry_after() -> TestResult {
    let (ctx, _) = context(&[], 2);

    for _ in 0..2 {
        let resp = handle_request(&get("/readings", VIEWER)?, peer()?, &ctx);
        assert_eq!(resp.status(), StatusCode::OK);
    }
    let resp = handle_request(&get("/readings", VIEWER)?, peer()?, &ctx);

    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = resp
        .headers()
        .get(RETRY_AFTER)
        .ok_or("missing Retry-After")?
        .to_str()?
        .parse()?;
    assert!((1..=60).contains(&retry_after), "unexpected Retry-After {retry_after}");
    let body = json_body(resp).await?;
    assert_eq!(body["error"], "Too many requests");
    Ok(())
}

#[tokio::test]
async fn test_ingest_reading() -> TestResult {
    let (ctx, store) = context(&[], 10);

    let resp = handle_request(&get("/measure?reading=21.5&m=1", ADMIN)?, peer()?, &ctx);

    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = json_body(resp).await?;
    assert_eq!(body["message"], "Reading saved successfully");
    assert_eq!(body["reading"]["id"], 1);
    assert_eq!(body["reading"]["value"], 21.5);
    assert_eq!(body["reading"]["mode"], 1);
    assert!(body["reading"].get("source_ip").is_none());

    let page = store.page(1, 10);
    assert_eq!(page.total, 1);
    assert_eq!(page.readings[0].source_ip, "10.0.0.1");
    Ok(())
}

#[tokio::test]
async fn test_ingest_validation() -> TestResult {
    let (ctx, store) = context(&[], 100);

    let cases = [
        ("/measure", "Missing or invalid reading parameter. Must be a float value."),
        ("/measure?reading=abc", "Missing or invalid reading parameter. Must be a float value."),
        ("/measure?reading=50.1", "Reading value must be between 0.0 and 50.0"),
        ("/measure?reading=-0.5", "Reading value must be between 0.0 and 50.0"),
        ("/measure?reading=NaN", "Reading value must be between 0.0 and 50.0"),
        ("/measure?reading=10&m=2", "Mode parameter (m) must be either 0 or 1"),
        ("/measure?reading=10&m=x", "Mode parameter (m) must be either 0 or 1"),
    ];

    for (uri, message) in cases {
        let resp = handle_request(&get(uri, ADMIN)?, peer()?, &ctx);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        let body = json_body(resp).await?;
        assert_eq!(body["error"], message, "{uri}");
    }
    assert!(store.is_empty());

    for uri in ["/measure?reading=0.0", "/measure?reading=50&m=0"] {
        let resp = handle_request(&get(uri, ADMIN)?, peer()?, &ctx);
        assert_eq!(resp.status(), StatusCode::CREATED, "{uri}");
    }
    Ok(())
}

#[tokio::test]
async fn test_list_readings_paginates_newest_first() -> TestResult {
    let (ctx, store) = context(&[], 100);
    let now = SystemTime::now();
    for value in [1.0, 2.0, 3.0] {
        store.insert(NewReading {
            value,
            mode: None,
            source_ip: "10.0.0.1".to_string(),
            recorded_at: now,
        });
    }

    let resp = handle_request(&get("/readings?page=1&per_page=2", VIEWER)?, peer()?, &ctx);
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await?;
    assert_eq!(body["total"], 3);
    assert_eq!(body["pages"], 2);
    assert_eq!(body["per_page"], 2);
    assert_eq!(body["readings"][0]["value"], 3.0);
    assert_eq!(body["readings"][1]["value"], 2.0);

    let resp = handle_request(&get("/readings?per_page=5000&page=0", VIEWER)?, peer()?, &ctx);
    let body = json_body(resp).await?;
    assert_eq!(body["per_page"], 1000);
    assert_eq!(body["page"], 1);
    Ok(())
}

#[tokio::test]
async fn test_period_readings() -> TestResult {
    let (ctx, store) = context(&[], 100);
    store.insert(NewReading {
        value: 5.0,
        mode: Some(0),
        source_ip: "10.0.0.1".to_string(),
        recorded_at: SystemTime::now(),
    });

    let resp = handle_request(&get("/readings/day", VIEWER)?, peer()?, &ctx);
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await?;
    assert_eq!(body["period"], "day");
    assert_eq!(body["hours"], 24);
    assert_eq!(body["count"], 1);

    let resp = handle_request(&get("/readings/year", VIEWER)?, peer()?, &ctx);
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await?;
    assert_eq!(body["error"], "Invalid period. Must be one of: hour, day, week, month");
    Ok(())
}

#[tokio::test]
async fn test_delete_reading() -> TestResult {
    let (ctx, store) = context(&[], 100);
    let reading = store.insert(NewReading {
        value: 5.0,
        mode: None,
        source_ip: "10.0.0.1".to_string(),
        recorded_at: SystemTime::now(),
    });
    let uri = format!("/readings/{}", reading.id);

    let resp = handle_request(&request(Method::DELETE, &uri, VIEWER)?, peer()?, &ctx);
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = handle_request(&request(Method::DELETE, &uri, ADMIN)?, peer()?, &ctx);
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(store.is_empty());

    let resp = handle_request(&request(Method::DELETE, &uri, ADMIN)?, peer()?, &ctx);
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = handle_request(&request(Method::DELETE, "/readings/abc", ADMIN)?, peer()?, &ctx);
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_wrong_method_on_known_path() -> TestResult {
    let (ctx, _) = context(&[], 10);

    let resp = handle_request(&request(Method::POST, "/readings", VIEWER)?, peer()?, &ctx);

    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint() -> TestResult {
    let (metrics, registry) = init_metrics()?;
    let (ctx, _) = context(&[], 10);
    let ctx = ctx.with_metrics(metrics, registry);

    let resp = handle_request(&get("/metrics", VIEWER)?, peer()?, &ctx);
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = handle_request(&get("/metrics", ADMIN)?, peer()?, &ctx);
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await?.to_bytes();
    let text = String::from_utf8(bytes.to_vec())?;
    assert!(text.contains("sensor_gate_decisions"), "{text}");
    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_without_registry_is_not_found() -> TestResult {
    let (ctx, _) = context(&[], 10);

    let resp = handle_request(&get("/metrics", ADMIN)?, peer()?, &ctx);

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}
