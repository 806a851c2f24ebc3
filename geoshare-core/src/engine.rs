//! Detection engine running every registered service over one input.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::join_all;
use tracing::{debug, error, warn};

use crate::collection::LocationCollection;
use crate::config::DetectionConfig;
use crate::input::{DetectionContext, DetectionInput};
use crate::model::ServiceMeta;
use crate::plugin::{Detector, ServiceRegistry};
use crate::ports::HttpPort;

/// Public entry point for turning raw input into locations.
pub struct DetectionEngine {
    registry: Arc<ServiceRegistry>,
    http: Option<Arc<dyn HttpPort>>,
    config: DetectionConfig,
}

impl DetectionEngine {
    /// Create an engine bound to the provided registry.
    #[must_use]
    pub fn new(registry: Arc<ServiceRegistry>, config: DetectionConfig) -> Self {
        Self {
            registry,
            http: None,
            config,
        }
    }

    /// Give services that need a lookup access to HTTP.
    #[must_use]
    pub fn with_http(mut self, http: Arc<dyn HttpPort>) -> Self {
        self.http = Some(http);
        self
    }

    /// Registry this engine dispatches to.
    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Empty collection using the configured dedup policy.
    #[must_use]
    pub fn new_collection(&self) -> LocationCollection {
        LocationCollection::with_policy(self.config.precision, self.config.equivalence)
    }

    /// Detect every location in `input`.
    ///
    /// Services are evaluated in registration order and their results merged
    /// in that order. A failing or panicking service only loses its own
    /// contribution; this call never fails.
    pub async fn detect(&self, input: &DetectionInput) -> LocationCollection {
        let context = DetectionContext::build(input, self.http.clone(), self.config.json_cache_ttl());
        let services = self.registry.all();

        let mut slots: Vec<Option<LocationCollection>> = services.iter().map(|_| None).collect();
        let mut lookups = Vec::new();
        let mut matched = 0_usize;

        for (index, service) in services.iter().enumerate() {
            let meta = service.meta();
            let mut detector = service.detector(input, &context);
            if !validate_isolated(meta, detector.as_mut()) {
                continue;
            }
            matched += 1;
            debug!(service = %meta.id, name = %meta.name, "input matched");

            let out = self.new_collection();
            if meta.network {
                lookups.push(async move { (index, process_isolated(meta, detector, out).await) });
            } else if let Some(slot) = slots.get_mut(index) {
                *slot = process_isolated(meta, detector, out).await;
            }
        }

        for (index, found) in join_all(lookups).await {
            if let Some(slot) = slots.get_mut(index) {
                *slot = found;
            }
        }

        let failed = matched - slots.iter().filter(|slot| slot.is_some()).count();
        let mut collection = self.new_collection();
        let mut suppressed = 0_usize;
        for found in slots.into_iter().flatten() {
            let offered = found.len();
            suppressed += offered - collection.add_all(found);
        }

        if collection.is_empty() && failed > 0 {
            warn!(failed, "no location detected, every matching service failed");
        }
        debug!(
            locations = collection.len(),
            matched, failed, suppressed, "detection finished"
        );
        collection
    }

    /// Shorthand for detecting in plain text.
    pub async fn detect_text(&self, text: &str) -> LocationCollection {
        self.detect(&DetectionInput::new(text)).await
    }
}

fn validate_isolated(meta: &ServiceMeta, detector: &mut (dyn Detector + '_)) -> bool {
    panic::catch_unwind(AssertUnwindSafe(|| detector.validate())).unwrap_or_else(|_| {
        error!(service = %meta.id, name = %meta.name, "service panicked while validating");
        false
    })
}

async fn process_isolated(
    meta: &ServiceMeta,
    mut detector: Box<dyn Detector + '_>,
    mut out: LocationCollection,
) -> Option<LocationCollection> {
    let outcome = AssertUnwindSafe(detector.process(&mut out))
        .catch_unwind()
        .await;
    match outcome {
        Ok(Ok(())) => Some(out),
        Ok(Err(err)) => {
            warn!(service = %meta.id, name = %meta.name, error = %err, "service failed to process input");
            None
        }
        Err(_) => {
            error!(service = %meta.id, name = %meta.name, "service panicked while processing");
            None
        }
    }
}
