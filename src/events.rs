//! Core event types for the signal correlator
//!
//! This module defines the normalized [`Signal`] that every analysis stage works on,
//! plus the backend-agnostic records the telemetry adapter hands to the collector.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Queried time range, shared by every query of one run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeRange {
    /// The `minutes` leading up to `end`
    pub fn ending_at(end: Timestamp, minutes: u32) -> Self {
        Self {
            start: end - Duration::minutes(minutes as i64),
            end,
        }
    }
}

/// Where a signal came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    /// Error-bearing log line
    Log,
    /// Failed or slow trace span
    Trace,
}

/// One normalized telemetry event
///
/// Produced by the collector from either a log record or a span record.
/// Downstream stages only ever see slices of signals sorted by `timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    /// When the event happened
    pub timestamp: Timestamp,
    /// Log or trace
    pub source: SignalSource,
    /// Owning service name, never empty
    pub service: String,
    /// Backend-provided severity text or span status code
    pub severity: String,
    /// Short description, already length-bounded by the collector
    pub summary: String,
    /// Span duration in milliseconds, 0 for log-derived signals
    pub duration_ms: f64,
    /// Whether the event represents a failure
    pub is_error: bool,
}

/// Service entry returned by the telemetry backend
///
/// Backend field names are mapped in the telemetry decoder; this type only
/// carries the neutral ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceSummary {
    pub name: String,
    #[serde(default)]
    pub call_count: u64,
    #[serde(default)]
    pub error_count: u64,
    /// Error rate as a percentage, when the backend reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_error_rate: Option<f64>,
}

impl ServiceSummary {
    pub fn new(name: impl Into<String>, call_count: u64, error_count: u64) -> Self {
        Self {
            name: name.into(),
            call_count,
            error_count,
            reported_error_rate: None,
        }
    }

    /// Error rate as a percentage (0-100)
    ///
    /// Uses the backend-reported value when present and non-zero, otherwise
    /// derives it from the call and error counters.
    pub fn error_rate(&self) -> f64 {
        match self.reported_error_rate {
            Some(rate) if rate > 0.0 => rate,
            _ if self.call_count > 0 => {
                self.error_count as f64 / self.call_count as f64 * 100.0
            }
            _ => 0.0,
        }
    }
}

/// Error log entry returned by the telemetry backend
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: Timestamp,
    pub body: String,
    pub service: String,
    pub severity_text: String,
}

/// Span entry returned by the telemetry backend
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRecord {
    pub timestamp: Timestamp,
    pub service: String,
    pub operation_name: String,
    pub duration_ms: f64,
    pub status_code: String,
}

impl SpanRecord {
    /// A span is failed when it carries any status other than OK / 0
    pub fn is_error(&self) -> bool {
        !self.status_code.is_empty() && self.status_code != "OK" && self.status_code != "0"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(status: &str) -> SpanRecord {
        SpanRecord {
            timestamp: Utc::now(),
            service: "checkout".to_string(),
            operation_name: "POST /pay".to_string(),
            duration_ms: 12.0,
            status_code: status.to_string(),
        }
    }

    #[test]
    fn test_span_error_status() {
        assert!(span("ERROR").is_error());
        assert!(span("2").is_error());
        assert!(!span("OK").is_error());
        assert!(!span("0").is_error());
        assert!(!span("").is_error());
    }

    #[test]
    fn test_service_error_rate_derived() {
        let svc = ServiceSummary::new("api", 1000, 50);
        assert!((svc.error_rate() - 5.0).abs() < f64::EPSILON);

        let idle = ServiceSummary::new("idle", 0, 0);
        assert_eq!(idle.error_rate(), 0.0);
    }

    #[test]
    fn test_service_error_rate_reported() {
        let mut svc = ServiceSummary::new("api", 1000, 50);
        svc.reported_error_rate = Some(1.5);
        assert_eq!(svc.error_rate(), 1.5);
    }

    #[test]
    fn test_service_summary_uses_neutral_names() {
        let value = serde_json::to_value(ServiceSummary::new("frontend", 10, 2)).unwrap();
        assert_eq!(value["name"], "frontend");
        assert_eq!(value["call_count"], 10);
        assert_eq!(value["error_count"], 2);
        assert!(value.get("serviceName").is_none());
        assert!(value.get("reported_error_rate").is_none());
    }

    #[test]
    fn test_time_range_ending_at() {
        let end = Utc::now();
        let range = TimeRange::ending_at(end, 45);
        assert_eq!(range.end, end);
        assert_eq!(range.end - range.start, Duration::minutes(45));
    }

    #[test]
    fn test_signal_source_serialization() {
        assert_eq!(
            serde_json::to_string(&SignalSource::Log).unwrap(),
            "\"log\""
        );
        assert_eq!(
            serde_json::to_string(&SignalSource::Trace).unwrap(),
            "\"trace\""
        );
    }
}
