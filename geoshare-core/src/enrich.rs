//! Best-effort decoration of detected locations with address, elevation and timezone.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, warn};

use crate::collection::LocationCollection;
use crate::config::EnrichmentConfig;
use crate::model::Coordinate;
use crate::ports::{AddressProvider, ElevationProvider, PortError, TimezoneInfo, TimezoneProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Kind of enrichment a caller may request.
pub enum EnrichKind {
    /// Reverse-geocoded address.
    Address,
    /// Elevation in meters.
    Elevation,
    /// Timezone name and offset.
    Timezone,
}

/// Receives provider failures, which are never raised to `enrich` callers.
pub trait ErrorSink: Send + Sync {
    /// Record that `kind` could not be resolved for `coordinate`.
    fn report(&self, kind: EnrichKind, coordinate: &Coordinate, error: &PortError);
}

/// Sink logging failures as warnings.
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, kind: EnrichKind, coordinate: &Coordinate, error: &PortError) {
        warn!(?kind, %coordinate, %error, "enrichment provider failed");
    }
}

#[derive(Clone, Default)]
/// Providers the pipeline may call. A missing provider skips its kind.
pub struct EnrichmentProviders {
    /// Reverse geocoding.
    pub address: Option<Arc<dyn AddressProvider>>,
    /// Elevation lookup.
    pub elevation: Option<Arc<dyn ElevationProvider>>,
    /// Timezone lookup.
    pub timezone: Option<Arc<dyn TimezoneProvider>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Outcome counts of one `enrich` call.
pub struct EnrichSummary {
    /// Calls that returned, with or without a value.
    pub completed: usize,
    /// Calls that failed or hit the per-call timeout.
    pub failed: usize,
    /// Calls dropped at the overall deadline.
    pub abandoned: usize,
}

enum Resolved {
    Address(Option<String>),
    Elevation(Option<f64>),
    Timezone(Option<TimezoneInfo>),
}

/// Runs provider calls for every (record, kind) pair with bounded concurrency.
pub struct EnrichmentPipeline {
    providers: EnrichmentProviders,
    config: EnrichmentConfig,
    sink: Arc<dyn ErrorSink>,
}

impl EnrichmentPipeline {
    /// Create a pipeline reporting failures through `tracing`.
    #[must_use]
    pub fn new(providers: EnrichmentProviders, config: EnrichmentConfig) -> Self {
        Self {
            providers,
            config,
            sink: Arc::new(TracingSink),
        }
    }

    /// Report provider failures to a custom sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    fn has_provider(&self, kind: EnrichKind) -> bool {
        match kind {
            EnrichKind::Address => self.providers.address.is_some(),
            EnrichKind::Elevation => self.providers.elevation.is_some(),
            EnrichKind::Timezone => self.providers.timezone.is_some(),
        }
    }

    /// Fill the requested fields of every record.
    ///
    /// Each record only ever receives its own results. Failed, timed out and
    /// abandoned calls leave their field unset; this call never fails.
    pub async fn enrich(
        &self,
        collection: &mut LocationCollection,
        kinds: &[EnrichKind],
    ) -> EnrichSummary {
        let mut unique = HashSet::new();
        let kinds: Vec<EnrichKind> = kinds
            .iter()
            .copied()
            .filter(|kind| unique.insert(*kind))
            .filter(|kind| {
                let available = self.has_provider(*kind);
                if !available {
                    debug!(?kind, "no provider configured, skipping");
                }
                available
            })
            .collect();

        let jobs: Vec<(usize, Coordinate, EnrichKind)> = collection
            .iter()
            .enumerate()
            .flat_map(|(index, record)| {
                kinds
                    .iter()
                    .map(move |kind| (index, *record.coordinate(), *kind))
            })
            .collect();
        let total = jobs.len();
        if total == 0 {
            return EnrichSummary::default();
        }

        let call_timeout = Duration::from_millis(self.config.call_timeout_ms);
        let deadline = Instant::now() + Duration::from_millis(self.config.overall_timeout_ms);
        let mut calls = stream::iter(jobs)
            .map(|(index, coordinate, kind)| async move {
                let outcome = timeout(call_timeout, self.resolve(kind, coordinate)).await;
                (index, coordinate, kind, outcome)
            })
            .buffer_unordered(self.config.fan_out.max(1));

        let mut summary = EnrichSummary::default();
        loop {
            match timeout_at(deadline, calls.next()).await {
                Ok(Some((index, coordinate, kind, outcome))) => match outcome {
                    Ok(Ok(resolved)) => {
                        summary.completed += 1;
                        apply(collection, index, resolved);
                    }
                    Ok(Err(err)) => {
                        summary.failed += 1;
                        self.sink.report(kind, &coordinate, &err);
                    }
                    Err(_) => {
                        summary.failed += 1;
                        self.sink.report(kind, &coordinate, &PortError::Timeout);
                    }
                },
                Ok(None) => break,
                Err(_) => {
                    summary.abandoned = total - summary.completed - summary.failed;
                    warn!(abandoned = summary.abandoned, "enrichment deadline reached");
                    break;
                }
            }
        }

        debug!(?summary, "enrichment finished");
        summary
    }

    async fn resolve(&self, kind: EnrichKind, coordinate: Coordinate) -> Result<Resolved, PortError> {
        match kind {
            EnrichKind::Address => match &self.providers.address {
                Some(provider) => provider.reverse_geocode(coordinate).await.map(Resolved::Address),
                None => Ok(Resolved::Address(None)),
            },
            EnrichKind::Elevation => match &self.providers.elevation {
                Some(provider) => provider.elevation(coordinate).await.map(Resolved::Elevation),
                None => Ok(Resolved::Elevation(None)),
            },
            EnrichKind::Timezone => match &self.providers.timezone {
                Some(provider) => provider.timezone(coordinate).await.map(Resolved::Timezone),
                None => Ok(Resolved::Timezone(None)),
            },
        }
    }
}

fn apply(collection: &mut LocationCollection, index: usize, resolved: Resolved) {
    let Some(record) = collection.get_mut(index) else {
        return;
    };
    match resolved {
        Resolved::Address(Some(address)) => record.address = Some(address),
        Resolved::Elevation(Some(elevation)) => record.elevation_meters = Some(elevation),
        Resolved::Timezone(Some(zone)) => {
            record.timezone_id = Some(zone.id);
            record.timezone_offset_seconds = Some(zone.offset_seconds);
        }
        Resolved::Address(None) | Resolved::Elevation(None) | Resolved::Timezone(None) => {}
    }
}
