//! Correlation run orchestration and result assembly
//!
//! A run lists services, optionally narrows them to one focus service, collects
//! signals, then clusters them and detects propagation over the same sorted
//! slice. The output is an immutable [`CorrelationResult`] that presentation
//! code reads through accessors.

use crate::aggregator::{detect_propagation, find_clusters, Cluster, PropagationEdge};
use crate::collectors::{CollectionStats, CollectorSettings, SignalCollector};
use crate::config::CorrelationConfig;
use crate::error::CorrelateError;
pub use crate::events::TimeRange;
use crate::events::{ServiceSummary, Signal, Timestamp};
use crate::telemetry::TelemetryQuerier;
use chrono::Utc;
use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Parameters for one correlation run
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelateOptions {
    /// Look-back window in minutes
    pub duration_minutes: u32,
    /// Restrict the run to a single service
    pub service: Option<String>,
    /// Cluster bucket width, also used as the propagation window
    pub bucket_seconds: i64,
    /// Minimum signals per cluster
    pub min_events: usize,
}

impl Default for CorrelateOptions {
    fn default() -> Self {
        Self::from(&CorrelationConfig::default())
    }
}

impl From<&CorrelationConfig> for CorrelateOptions {
    fn from(config: &CorrelationConfig) -> Self {
        Self {
            duration_minutes: config.duration_minutes,
            service: None,
            bucket_seconds: config.bucket_seconds,
            min_events: config.min_events,
        }
    }
}

/// Complete output of one correlation run
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationResult {
    time_range: TimeRange,
    services: Vec<ServiceSummary>,
    signals: Vec<Signal>,
    clusters: Vec<Cluster>,
    propagation: Vec<PropagationEdge>,
    collection: CollectionStats,
    collected_at: Timestamp,
}

impl CorrelationResult {
    /// Bundle analysis outputs without further computation
    pub fn new(
        time_range: TimeRange,
        services: Vec<ServiceSummary>,
        signals: Vec<Signal>,
        clusters: Vec<Cluster>,
        propagation: Vec<PropagationEdge>,
        collection: CollectionStats,
    ) -> Self {
        Self {
            time_range,
            services,
            signals,
            clusters,
            propagation,
            collection,
            collected_at: Utc::now(),
        }
    }

    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    pub fn services(&self) -> &[ServiceSummary] {
        &self.services
    }

    /// All collected signals, ascending by timestamp
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Clusters, highest score first
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Propagation edges, most supported first
    pub fn propagation(&self) -> &[PropagationEdge] {
        &self.propagation
    }

    pub fn collection(&self) -> &CollectionStats {
        &self.collection
    }

    pub fn collected_at(&self) -> Timestamp {
        self.collected_at
    }

    /// No clusters were found
    pub fn is_quiet(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// Run clustering and propagation detection side by side on one sorted slice
pub fn analyze(
    signals: &[Signal],
    bucket_seconds: i64,
    min_events: usize,
) -> (Vec<Cluster>, Vec<PropagationEdge>) {
    std::thread::scope(|scope| {
        let clusters = scope.spawn(|| find_clusters(signals, bucket_seconds, min_events));
        let edges = detect_propagation(signals, bucket_seconds);
        let clusters = clusters
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        (clusters, edges)
    })
}

/// Drives a correlation run against a telemetry backend
pub struct Correlator {
    querier: Arc<dyn TelemetryQuerier>,
    collector: SignalCollector,
}

impl Correlator {
    pub fn new(querier: Arc<dyn TelemetryQuerier>, settings: CollectorSettings) -> Self {
        let collector = SignalCollector::new(Arc::clone(&querier), settings);
        Self { querier, collector }
    }

    /// Execute one correlation run
    ///
    /// The time range is fixed once at the start and every query uses it.
    /// Cancellation only affects collection: the run finishes with whatever
    /// signals were gathered before `cancel` fired.
    ///
    /// # Errors
    ///
    /// Returns `CorrelateError::ListServices` if the service list cannot be
    /// fetched, and `CorrelateError::ServiceNotFound` if the focus service is
    /// not in it. Both are raised before any signals are collected.
    pub async fn run(
        &self,
        options: &CorrelateOptions,
        cancel: &CancellationToken,
    ) -> Result<CorrelationResult, CorrelateError> {
        let time_range = TimeRange::ending_at(Utc::now(), options.duration_minutes);

        let mut services = self
            .querier
            .list_services()
            .await
            .map_err(CorrelateError::ListServices)?;
        info!("Found {} services", services.len());

        if let Some(focus) = &options.service {
            services.retain(|svc| &svc.name == focus);
            if services.is_empty() {
                return Err(CorrelateError::ServiceNotFound(focus.clone()));
            }
            info!("Focusing on service {}", focus);
        }

        let collection = self
            .collector
            .collect(&services, time_range, cancel)
            .await;

        let started = Instant::now();
        let (clusters, propagation) = analyze(
            &collection.signals,
            options.bucket_seconds,
            options.min_events,
        );
        debug!(
            "Analysis of {} signals took {:?}",
            collection.signals.len(),
            started.elapsed()
        );
        info!(
            "Found {} clusters and {} propagation edges",
            clusters.len(),
            propagation.len()
        );

        Ok(CorrelationResult::new(
            time_range,
            services,
            collection.signals,
            clusters,
            propagation,
            collection.stats,
        ))
    }
}
