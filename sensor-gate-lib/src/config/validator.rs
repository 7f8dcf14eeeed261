use std::collections::HashSet;
use tracing::warn;

use crate::config::security::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECONDS, MAX_WINDOW_SECONDS};
use crate::config::Config;

/// Repair what can be repaired and drop what cannot.
///
/// Nothing here fails: a bad rate limit value falls back to its default and an
/// unusable principal is dropped, each with a warning.
pub fn validate(config: &mut Config) {
    let rate_limit = &mut config.security.rate_limit;
    if rate_limit.window_seconds == 0 {
        warn!(default = DEFAULT_WINDOW_SECONDS, "rate limit window_seconds must be > 0, using default");
        rate_limit.window_seconds = DEFAULT_WINDOW_SECONDS;
    } else if rate_limit.window_seconds > MAX_WINDOW_SECONDS {
        warn!(
            window_seconds = rate_limit.window_seconds,
            max = MAX_WINDOW_SECONDS,
            "rate limit window_seconds too large, capping"
        );
        rate_limit.window_seconds = MAX_WINDOW_SECONDS;
    }
    if rate_limit.max_requests == 0 {
        warn!(default = DEFAULT_MAX_REQUESTS, "rate limit max_requests must be > 0, using default");
        rate_limit.max_requests = DEFAULT_MAX_REQUESTS;
    }

    let mut seen = HashSet::new();
    config.security.principals.retain(|p| {
        if p.identifier.is_empty() {
            warn!("principal with empty identifier ignored");
            return false;
        }
        if p.identifier.contains(':') {
            warn!(identifier = %p.identifier, "principal identifier may not contain ':', ignored");
            return false;
        }
        if p.secret.is_empty() {
            warn!(identifier = %p.identifier, "principal with empty secret ignored");
            return false;
        }
        if !seen.insert(p.identifier.clone()) {
            warn!(identifier = %p.identifier, "duplicate principal ignored, first definition wins");
            return false;
        }
        true
    });

    if config.security.principals.is_empty() {
        warn!("no principals configured, every request will be denied as unauthenticated");
    }
}
