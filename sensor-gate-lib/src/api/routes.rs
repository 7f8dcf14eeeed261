use http::Method;

use crate::security::Requirement;

/// Time span accepted by `/readings/<period>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Hour,
    Day,
    Week,
    Month,
}

impl Period {
    pub const ALL: [Period; 4] = [Period::Hour, Period::Day, Period::Week, Period::Month];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hour" => Some(Period::Hour),
            "day" => Some(Period::Day),
            "week" => Some(Period::Week),
            "month" => Some(Period::Month),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Hour => "hour",
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
        }
    }

    pub fn hours(&self) -> u64 {
        match self {
            Period::Hour => 1,
            Period::Day => 24,
            Period::Week => 168,
            Period::Month => 720,
        }
    }
}

/// Operation selected by method and path.
///
/// Path parameters are kept raw; they are validated only after the
/// gatekeeper has permitted the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    IngestReading,
    ListReadings,
    PeriodReadings(String),
    DeleteReading(String),
    Metrics,
    MethodNotAllowed,
    NotFound,
}

impl Operation {
    /// Capability the gatekeeper must confirm before the operation runs
    pub fn requirement(&self) -> Requirement {
        match self {
            Operation::IngestReading | Operation::DeleteReading(_) | Operation::Metrics => {
                Requirement::ADMINISTRATOR
            }
            Operation::ListReadings
            | Operation::PeriodReadings(_)
            | Operation::MethodNotAllowed
            | Operation::NotFound => Requirement::AnyPrincipal,
        }
    }

    /// Low-cardinality route label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            Operation::IngestReading => "/measure",
            Operation::ListReadings => "/readings",
            Operation::PeriodReadings(_) => "/readings/{period}",
            Operation::DeleteReading(_) => "/readings/{id}",
            Operation::Metrics => "/metrics",
            Operation::MethodNotAllowed | Operation::NotFound => "unmatched",
        }
    }
}

pub fn resolve(method: &Method, path: &str) -> Operation {
    let path = path.trim_end_matches('/');
    let segments: Vec<&str> = path.split('/').skip(1).collect();

    let get = *method == Method::GET;
    let delete = *method == Method::DELETE;

    match segments.as_slice() {
        ["measure"] if get => Operation::IngestReading,
        ["readings"] if get => Operation::ListReadings,
        ["readings", param] if get => Operation::PeriodReadings(param.to_string()),
        ["readings", param] if delete => Operation::DeleteReading(param.to_string()),
        ["metrics"] if get => Operation::Metrics,
        ["measure"] | ["readings"] | ["readings", _] | ["metrics"] => Operation::MethodNotAllowed,
        _ => Operation::NotFound,
    }
}
