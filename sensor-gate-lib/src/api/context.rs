use prometheus::Registry;
use std::sync::Arc;

use crate::config::Config;
use crate::security::Gatekeeper;
use crate::store::ReadingStore;
use crate::telemetry::Metrics;

/// Shared state for request handling
pub struct AppContext {
    pub gatekeeper: Gatekeeper,
    pub store: Arc<dyn ReadingStore>,
    pub metrics: Option<Arc<Metrics>>,
    pub registry: Option<Registry>,
}

impl AppContext {
    pub fn new(gatekeeper: Gatekeeper, store: Arc<dyn ReadingStore>) -> Self {
        Self { gatekeeper, store, metrics: None, registry: None }
    }

    pub fn from_config(config: &Config, store: Arc<dyn ReadingStore>) -> Self {
        Self::new(Gatekeeper::from_config(&config.security), store)
    }

    /// Attach metrics to the context and its gatekeeper; `registry` backs `/metrics`
    pub fn with_metrics(self, metrics: Arc<Metrics>, registry: Registry) -> Self {
        let Self { gatekeeper, store, .. } = self;
        Self {
            gatekeeper: gatekeeper.with_metrics(Arc::clone(&metrics)),
            store,
            metrics: Some(metrics),
            registry: Some(registry),
        }
    }
}
