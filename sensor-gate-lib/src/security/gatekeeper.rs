//! Ordered access-control pipeline run before every protected operation.
//!
//! ```text
//! AddressCheck → RateCheck → AuthenticationCheck → AuthorizationCheck → Permit
//!      │              │               │                     │
//!   403 deny       429 deny        401 deny              403 deny
//! ```
//!
//! The first failing step ends evaluation; later steps never run. In
//! particular an address refused by the allow-list is never recorded by the
//! rate limiter, and a rate-limited request never reaches credential
//! verification.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::StatusCode;
use tracing::{debug, warn};

use crate::config::SecurityConfig;
use crate::security::rate_limit::{RateLimitResult, RateLimiter};
use crate::security::{
    AllowList, Authenticator, Authorizer, ClientAddress, Credential, CredentialStore, Principal,
    Requirement,
};
use crate::telemetry::Metrics;

/// Why a request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    AddressNotAllowed,
    RateLimited,
    Unauthenticated,
    Forbidden,
}

impl DenyReason {
    /// Suggested transport status
    pub fn status_code(&self) -> StatusCode {
        match self {
            DenyReason::AddressNotAllowed => StatusCode::FORBIDDEN,
            DenyReason::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            DenyReason::Unauthenticated => StatusCode::UNAUTHORIZED,
            DenyReason::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    /// Name of the failing pipeline step, for logs and metrics
    pub fn step(&self) -> &'static str {
        match self {
            DenyReason::AddressNotAllowed => "address_check",
            DenyReason::RateLimited => "rate_check",
            DenyReason::Unauthenticated => "authentication_check",
            DenyReason::Forbidden => "authorization_check",
        }
    }

    /// Short, non-diagnostic message safe to return to the caller
    pub fn public_message(&self) -> &'static str {
        match self {
            DenyReason::AddressNotAllowed => "Access denied",
            DenyReason::RateLimited => "Too many requests",
            DenyReason::Unauthenticated => "Authentication required",
            DenyReason::Forbidden => "Access denied. Admin privileges required.",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.public_message())
    }
}

/// The single verdict produced for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Permit(Principal),
    Deny(DenyReason),
}

impl Decision {
    pub fn is_permit(&self) -> bool {
        matches!(self, Decision::Permit(_))
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Decision::Permit(p) => Some(p),
            Decision::Deny(_) => None,
        }
    }

    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Decision::Permit(_) => None,
            Decision::Deny(reason) => Some(*reason),
        }
    }
}

/// What a protected operation presents to the gatekeeper
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    /// Transport-level client address, as a string
    pub address: &'a str,
    /// Credential extracted from the request, if any
    pub credential: Option<&'a Credential>,
    /// Capability the operation requires
    pub requirement: Requirement,
}

/// Decision plus the rate limiter's retry hint for `RateLimited`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub decision: Decision,
    pub retry_after: Option<Duration>,
}

/// Composes allow-list, rate limiter, authenticator and authorizer.
///
/// The rate limiter is the only mutable state and is shared by reference, so
/// tests and the server can inspect or sweep the same table the pipeline uses.
pub struct Gatekeeper {
    allow_list: AllowList,
    rate_limiter: Arc<RateLimiter>,
    authenticator: Authenticator,
    authorizer: Authorizer,
    metrics: Option<Arc<Metrics>>,
}

impl Gatekeeper {
    pub fn new(
        allow_list: AllowList,
        rate_limiter: Arc<RateLimiter>,
        authenticator: Authenticator,
        authorizer: Authorizer,
    ) -> Self {
        Self { allow_list, rate_limiter, authenticator, authorizer, metrics: None }
    }

    /// Build every component from configuration. Invalid entries are logged and skipped.
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(
            AllowList::from_expressions(&config.allowed_networks),
            Arc::new(RateLimiter::from_config(&config.rate_limit)),
            Authenticator::new(CredentialStore::from_config(&config.principals)),
            Authorizer,
        )
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Evaluate `request` now
    pub fn check(&self, request: &GateRequest<'_>) -> Decision {
        self.evaluate(request, Instant::now()).decision
    }

    /// Evaluate `request` at `now`
    pub fn check_at(&self, request: &GateRequest<'_>, now: Instant) -> Decision {
        self.evaluate(request, now).decision
    }

    /// Evaluate `request` at `now`, keeping the retry hint of a rate-limit denial
    pub fn evaluate(&self, request: &GateRequest<'_>, now: Instant) -> Verdict {
        let address = match request.address.parse::<ClientAddress>() {
            Ok(addr) => addr,
            Err(_) => {
                return self.deny(request.address, DenyReason::AddressNotAllowed, None, None);
            }
        };

        if !self.allow_list.is_permitted(&address) {
            return self.deny(request.address, DenyReason::AddressNotAllowed, None, None);
        }

        if let RateLimitResult::Limited { retry_after, .. } = self.rate_limiter.allow(&address, now)
        {
            return self.deny(request.address, DenyReason::RateLimited, None, Some(retry_after));
        }

        let Some(principal) = request.credential.and_then(|c| self.authenticator.authenticate(c))
        else {
            let identifier = request.credential.map(Credential::identifier);
            return self.deny(request.address, DenyReason::Unauthenticated, identifier, None);
        };

        if !self.authorizer.authorize(&principal, request.requirement) {
            return self.deny(
                request.address,
                DenyReason::Forbidden,
                Some(&principal.identifier),
                None,
            );
        }

        debug!(client = %address, identifier = %principal.identifier, role = %principal.role, "request permitted");
        if let Some(m) = &self.metrics {
            m.record_permit();
        }
        Verdict { decision: Decision::Permit(principal), retry_after: None }
    }

    fn deny(
        &self,
        address: &str,
        reason: DenyReason,
        identifier: Option<&str>,
        retry_after: Option<Duration>,
    ) -> Verdict {
        match identifier {
            Some(identifier) => {
                warn!(client = %address, step = reason.step(), identifier = %identifier, "request denied")
            }
            None => warn!(client = %address, step = reason.step(), "request denied"),
        }
        if let Some(m) = &self.metrics {
            m.record_deny(reason.step());
        }
        Verdict { decision: Decision::Deny(reason), retry_after }
    }

    /// Challenge header value to send with an `Unauthenticated` denial
    pub fn challenge(&self) -> String {
        self.authenticator.challenge()
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::Role;

    fn gatekeeper(networks: &[&str], max_requests: usize) -> Gatekeeper {
        let mut store = CredentialStore::new();
        store.insert("admin", "adminpw", Role::Administrator);
        store.insert("viewer", "viewerpw", Role::Viewer);
        Gatekeeper::new(
            AllowList::from_expressions(networks),
            Arc::new(RateLimiter::new(max_requests, Duration::from_secs(60))),
            Authenticator::new(store),
            Authorizer,
        )
    }

    #[test]
    fn test_reason_mapping() {
        assert_eq!(DenyReason::AddressNotAllowed.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(DenyReason::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(DenyReason::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(DenyReason::Forbidden.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_unparseable_address_is_denied_before_rate_check() {
        let gate = gatekeeper(&[], 10);
        let cred = Credential::new("admin", "adminpw");
        let request = GateRequest {
            address: "not-an-ip",
            credential: Some(&cred),
            requirement: Requirement::AnyPrincipal,
        };
        assert_eq!(gate.check(&request), Decision::Deny(DenyReason::AddressNotAllowed));
        assert_eq!(gate.rate_limiter().tracked_addresses(), 0);
    }

    #[test]
    fn test_rate_limited_carries_retry_hint() {
        let gate = gatekeeper(&[], 1);
        let now = Instant::now();
        let request =
            GateRequest { address: "10.0.0.1", credential: None, requirement: Requirement::AnyPrincipal };

        let first = gate.evaluate(&request, now);
        assert_eq!(first.decision, Decision::Deny(DenyReason::Unauthenticated));
        let second = gate.evaluate(&request, now + Duration::from_secs(10));
        assert_eq!(second.decision, Decision::Deny(DenyReason::RateLimited));
        assert_eq!(second.retry_after, Some(Duration::from_secs(50)));
    }

    #[test]
    fn test_missing_credential_is_unauthenticated() {
        let gate = gatekeeper(&[], 10);
        let request =
            GateRequest { address: "10.0.0.1", credential: None, requirement: Requirement::AnyPrincipal };
        assert_eq!(gate.check(&request), Decision::Deny(DenyReason::Unauthenticated));
    }
}
