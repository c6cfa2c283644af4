/// SigNoz HTTP client
pub mod client;

/// Tolerant decoding of query_range responses
pub mod decode;

pub use client::SignozClient;

use crate::error::CollectorError;
use crate::events::{LogRecord, ServiceSummary, SpanRecord, TimeRange};
use async_trait::async_trait;

/// Query interface the collector needs from a telemetry backend
///
/// Every call may fail on its own. Callers decide whether a failure is fatal;
/// the collector treats failed per-service queries as "no records".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetryQuerier: Send + Sync {
    /// List services known to the backend
    async fn list_services(&self) -> Result<Vec<ServiceSummary>, CollectorError>;

    /// Fetch up to `limit` error-severity logs of `service` inside `range`
    async fn query_error_logs(
        &self,
        service: &str,
        range: TimeRange,
        limit: usize,
    ) -> Result<Vec<LogRecord>, CollectorError>;

    /// Fetch up to `limit` spans of `service` inside `range`
    async fn query_traces(
        &self,
        service: &str,
        range: TimeRange,
        limit: usize,
    ) -> Result<Vec<SpanRecord>, CollectorError>;
}
