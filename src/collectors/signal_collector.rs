use crate::config::CorrelationConfig;
use crate::error::CollectorError;
use crate::events::{LogRecord, ServiceSummary, Signal, SignalSource, SpanRecord, TimeRange};
use crate::telemetry::TelemetryQuerier;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Tunables for signal collection
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorSettings {
    /// Maximum records requested per query
    pub query_limit: usize,
    /// Successful spans slower than this still become signals
    pub slow_span_ms: f64,
    /// Longest summary kept before truncation
    pub summary_max_chars: usize,
    /// Services queried at the same time
    pub max_concurrent_services: usize,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self::from(&CorrelationConfig::default())
    }
}

impl From<&CorrelationConfig> for CollectorSettings {
    fn from(config: &CorrelationConfig) -> Self {
        Self {
            query_limit: config.query_limit,
            slow_span_ms: config.slow_span_ms,
            summary_max_chars: config.summary_max_chars,
            max_concurrent_services: config.max_concurrent_services,
        }
    }
}

/// Which query a failure belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Logs,
    Traces,
}

/// A per-service query that failed and contributed no signals
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailedQuery {
    pub service: String,
    pub kind: QueryKind,
    pub error: String,
}

/// Bookkeeping about one collection pass
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CollectionStats {
    /// Number of services queried
    pub services_queried: usize,
    /// Queries that failed
    pub failed_queries: Vec<FailedQuery>,
    /// Services with at least one query abandoned on cancellation
    pub cancelled_services: Vec<String>,
}

impl CollectionStats {
    /// Whether every query completed successfully
    pub fn is_complete(&self) -> bool {
        self.failed_queries.is_empty() && self.cancelled_services.is_empty()
    }
}

/// Signals gathered from all services, sorted by timestamp
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub signals: Vec<Signal>,
    pub stats: CollectionStats,
}

struct ServiceOutcome {
    service: String,
    logs: Option<Result<Vec<LogRecord>, CollectorError>>,
    traces: Option<Result<Vec<SpanRecord>, CollectorError>>,
}

/// Gathers error logs and notable spans for a set of services
///
/// Queries run concurrently with a bounded number of services in flight.
/// A failed or cancelled query only removes that service's contribution.
pub struct SignalCollector {
    querier: Arc<dyn TelemetryQuerier>,
    settings: CollectorSettings,
}

impl SignalCollector {
    pub fn new(querier: Arc<dyn TelemetryQuerier>, settings: CollectorSettings) -> Self {
        Self { querier, settings }
    }

    /// Collect signals for `services` inside `range`
    ///
    /// Every query of the pass uses the same `range`. When `cancel` fires, pending queries are abandoned and the signals from
    /// already finished queries are returned.
    pub async fn collect(
        &self,
        services: &[ServiceSummary],
        range: TimeRange,
        cancel: &CancellationToken,
    ) -> Collection {
        info!(
            "Collecting signals from {} services between {} and {}",
            services.len(),
            range.start.to_rfc3339(),
            range.end.to_rfc3339()
        );

        let outcomes: Vec<ServiceOutcome> = stream::iter(services.iter())
            .map(|svc| self.collect_service(svc.name.clone(), range, cancel))
            .buffer_unordered(self.settings.max_concurrent_services.max(1))
            .collect()
            .await;

        let mut collection = Collection::default();
        collection.stats.services_queried = services.len();

        for outcome in outcomes {
            let service = outcome.service;
            let mut cancelled = false;

            match outcome.logs {
                Some(Ok(records)) => {
                    debug!("{}: {} error logs", service, records.len());
                    collection.signals.extend(
                        records
                            .into_iter()
                            .map(|r| log_signal(r, &service, self.settings.summary_max_chars)),
                    );
                }
                Some(Err(e)) => {
                    warn!("Log query for {} failed, skipping its logs: {}", service, e);
                    collection.stats.failed_queries.push(FailedQuery {
                        service: service.clone(),
                        kind: QueryKind::Logs,
                        error: e.to_string(),
                    });
                }
                None => cancelled = true,
            }

            match outcome.traces {
                Some(Ok(records)) => {
                    debug!("{}: {} spans", service, records.len());
                    collection
                        .signals
                        .extend(records.into_iter().filter_map(|r| {
                            span_signal(
                                r,
                                &service,
                                self.settings.slow_span_ms,
                                self.settings.summary_max_chars,
                            )
                        }));
                }
                Some(Err(e)) => {
                    warn!("Trace query for {} failed, skipping its spans: {}", service, e);
                    collection.stats.failed_queries.push(FailedQuery {
                        service: service.clone(),
                        kind: QueryKind::Traces,
                        error: e.to_string(),
                    });
                }
                None => cancelled = true,
            }

            if cancelled {
                collection.stats.cancelled_services.push(service);
            }
        }

        if !collection.stats.cancelled_services.is_empty() {
            warn!(
                "Collection cancelled, continuing without {} services",
                collection.stats.cancelled_services.len()
            );
        }

        // buffer_unordered yields in completion order; keep reports stable
        collection.stats.failed_queries.sort_by(|a, b| {
            (a.service.as_str(), a.kind as u8).cmp(&(b.service.as_str(), b.kind as u8))
        });
        collection.stats.cancelled_services.sort();

        sort_signals(&mut collection.signals);
        info!("Collected {} signals", collection.signals.len());
        collection
    }

    async fn collect_service(
        &self,
        service: String,
        range: TimeRange,
        cancel: &CancellationToken,
    ) -> ServiceOutcome {
        let limit = self.settings.query_limit;
        let (logs, traces) = tokio::join!(
            until_cancelled(
                cancel,
                self.querier.query_error_logs(&service, range, limit)
            ),
            until_cancelled(cancel, self.querier.query_traces(&service, range, limit)),
        );

        ServiceOutcome {
            service,
            logs,
            traces,
        }
    }
}

/// Run `fut` unless `cancel` fires first
async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = fut => Some(output),
    }
}

/// Convert an error log into a signal
pub fn log_signal(record: LogRecord, service: &str, max_chars: usize) -> Signal {
    let severity = if record.severity_text.is_empty() {
        "error".to_string()
    } else {
        record.severity_text
    };

    Signal {
        timestamp: record.timestamp,
        source: SignalSource::Log,
        service: service.to_string(),
        severity,
        summary: truncate_summary(&record.body, max_chars),
        duration_ms: 0.0,
        is_error: true,
    }
}

/// Convert a span into a signal if it failed or was slow
///
/// Spans that are neither are dropped. The span's own service name wins over
/// the queried one when present.
pub fn span_signal(
    record: SpanRecord,
    service: &str,
    slow_span_ms: f64,
    max_chars: usize,
) -> Option<Signal> {
    let is_error = record.is_error();
    let is_slow = record.duration_ms > slow_span_ms;
    if !is_error && !is_slow {
        return None;
    }

    let mut summary = record.operation_name.clone();
    if is_error {
        summary.push_str(&format!(" [status:{}]", record.status_code));
    }
    if is_slow {
        summary.push_str(&format!(" [{:.0}ms]", record.duration_ms));
    }

    let service = if record.service.is_empty() {
        service.to_string()
    } else {
        record.service
    };

    Some(Signal {
        timestamp: record.timestamp,
        source: SignalSource::Trace,
        service,
        severity: record.status_code,
        summary: truncate_summary(&summary, max_chars),
        duration_ms: record.duration_ms,
        is_error,
    })
}

/// Cut `text` to at most `max_chars` characters, marking the cut with "..."
pub fn truncate_summary(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Stable sort by timestamp, ascending
pub fn sort_signals(signals: &mut [Signal]) {
    signals.sort_by_key(|s| s.timestamp);
}


// Property-based tests
#[cfg(test)]
mod property_tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn prop_sorted_stream_is_non_decreasing(offsets: Vec<i32>) -> bool {
        let base = Utc.with_ymd_and_hms(2026, 2, 28, 10, 0, 0).unwrap();
        let mut signals: Vec<Signal> = offsets
            .iter()
            .map(|offset| {
                log_signal(
                    LogRecord {
                        timestamp: base + Duration::milliseconds(*offset as i64),
                        body: format!("at {}", offset),
                        service: "svc".to_string(),
                        severity_text: "error".to_string(),
                    },
                    "svc",
                    120,
                )
            })
            .collect();

        sort_signals(&mut signals);

        signals.len() == offsets.len()
            && signals.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
    }

    #[quickcheck]
    fn prop_truncated_summary_is_bounded(text: String, max_chars: u8) -> bool {
        let max_chars = max_chars as usize + 1;
        let truncated = truncate_summary(&text, max_chars);
        truncated.chars().count() <= max_chars + 3
    }
}
