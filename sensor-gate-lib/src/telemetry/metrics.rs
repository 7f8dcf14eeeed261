use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::sync::Arc;

use crate::error::{GateError, Result};

pub mod labels {
    pub const OUTCOME: &str = "outcome";
    pub const REASON: &str = "reason";
    pub const ROUTE: &str = "route";
    pub const STATUS_CODE: &str = "status_code";
    pub const METHOD: &str = "method";
    pub const VERSION: &str = "version";
}

pub mod values {
    pub const OUTCOME_PERMIT: &str = "permit";
    pub const OUTCOME_DENY: &str = "deny";
}

#[derive(Clone)]
pub struct Metrics {
    pub decisions_total: Counter<u64>,

    pub requests_total: Counter<u64>,
    pub requests_duration_seconds: Histogram<f64>,

    pub readings_ingested_total: Counter<u64>,
    pub rate_limit_evictions_total: Counter<u64>,

    pub build_info: Gauge<u64>,
}

impl Metrics {
    pub fn new(meter: Meter) -> Self {
        Self {
            decisions_total: meter
                .u64_counter("sensor_gate_decisions_total")
                .with_description("Gatekeeper decisions by outcome and deny reason")
                .build(),

            requests_total: meter
                .u64_counter("sensor_gate_requests_total")
                .with_description("Total number of requests answered")
                .build(),
            requests_duration_seconds: meter
                .f64_histogram("sensor_gate_requests_duration_seconds")
                .with_description("Request duration in seconds")
                .build(),

            readings_ingested_total: meter
                .u64_counter("sensor_gate_readings_ingested_total")
                .with_description("Total number of readings stored")
                .build(),
            rate_limit_evictions_total: meter
                .u64_counter("sensor_gate_rate_limit_evictions_total")
                .with_description("Idle client addresses evicted from the rate limiter")
                .build(),

            build_info: meter
                .u64_gauge("sensor_gate_build_info")
                .with_description("Build information (version)")
                .build(),
        }
    }

    pub fn set_build_info(&self) {
        self.build_info
            .record(1, &[KeyValue::new(labels::VERSION, env!("CARGO_PKG_VERSION"))]);
    }

    pub fn record_permit(&self) {
        self.decisions_total
            .add(1, &[KeyValue::new(labels::OUTCOME, values::OUTCOME_PERMIT)]);
    }

    pub fn record_deny(&self, reason: &'static str) {
        self.decisions_total.add(
            1,
            &[
                KeyValue::new(labels::OUTCOME, values::OUTCOME_DENY),
                KeyValue::new(labels::REASON, reason),
            ],
        );
    }

    pub fn record_request(&self, method: &str, status_code: u16, route: &str, duration: f64) {
        let attrs = [
            KeyValue::new(labels::METHOD, method.to_string()),
            KeyValue::new(labels::STATUS_CODE, status_code.to_string()),
            KeyValue::new(labels::ROUTE, route.to_string()),
        ];
        self.requests_total.add(1, &attrs);
        self.requests_duration_seconds.record(duration, &attrs);
    }

    pub fn record_reading_ingested(&self) {
        self.readings_ingested_total.add(1, &[]);
    }

    pub fn record_evictions(&self, count: u64) {
        if count > 0 {
            self.rate_limit_evictions_total.add(count, &[]);
        }
    }
}

pub fn init_metrics() -> Result<(Arc<Metrics>, Registry)> {
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()
        .map_err(|e| GateError::Metrics(format!("Failed to build prometheus exporter: {e}")))?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("sensor-gate");
    let metrics = Arc::new(Metrics::new(meter));

    metrics.set_build_info();

    Ok((metrics, registry))
}
