//! Stateless presentation of a [`CorrelationResult`]
//!
//! Every renderer takes a finished result and returns text. Nothing here feeds
//! back into the analysis.

/// Coloured terminal report
pub mod terminal;

/// Markdown report with a mermaid propagation graph
pub mod markdown;

/// Prompt text for the AI narrative
pub mod prompt;

pub use markdown::render_markdown;
pub use prompt::build_prompt;
pub use terminal::render_terminal;

use crate::correlator::CorrelationResult;
use crate::events::{ServiceSummary, SignalSource};
use chrono::Duration;

/// Clusters shown in the terminal report
pub const TOP_CLUSTERS: usize = 5;

/// Signals listed under each cluster in the terminal report
pub const SIGNALS_PER_CLUSTER: usize = 5;

/// Error-rate percentages above which a service is flagged
const CRITICAL_ERROR_RATE: f64 = 5.0;
const DEGRADED_ERROR_RATE: f64 = 1.0;

/// Health of a service judged by its error rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceHealth {
    Healthy,
    Degraded,
    Critical,
}

impl ServiceHealth {
    pub fn of(service: &ServiceSummary) -> Self {
        let rate = service.error_rate();
        if rate > CRITICAL_ERROR_RATE {
            ServiceHealth::Critical
        } else if rate > DEGRADED_ERROR_RATE {
            ServiceHealth::Degraded
        } else {
            ServiceHealth::Healthy
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            ServiceHealth::Healthy => "✅",
            ServiceHealth::Degraded => "🟡",
            ServiceHealth::Critical => "🔴",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ServiceHealth::Healthy => "Healthy",
            ServiceHealth::Degraded => "Degraded",
            ServiceHealth::Critical => "Critical",
        }
    }
}

/// Serialize the whole result as pretty JSON
pub fn render_json(result: &CorrelationResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(result)
}

/// Make a service name usable as a mermaid node id
pub fn sanitize_mermaid(name: &str) -> String {
    name.replace(['-', '.', '/'], "_")
}

/// Short label for the queried window, e.g. "60m"
fn window_label(result: &CorrelationResult) -> String {
    let range = result.time_range();
    format!("{}m", (range.end - range.start).num_minutes())
}

fn source_label(source: SignalSource) -> &'static str {
    match source {
        SignalSource::Log => "log",
        SignalSource::Trace => "trace",
    }
}

/// Human duration rounded to the second, e.g. "45s" or "2m5s"
fn format_span(span: Duration) -> String {
    let secs = (span.num_milliseconds() as f64 / 1000.0).round() as i64;
    if secs >= 60 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// One-line note about failed or cancelled collection, if any
fn collection_note(result: &CorrelationResult) -> Option<String> {
    let stats = result.collection();
    if stats.is_complete() {
        return None;
    }

    let mut parts = Vec::new();
    if !stats.failed_queries.is_empty() {
        parts.push(format!("{} failed queries", stats.failed_queries.len()));
    }
    if !stats.cancelled_services.is_empty() {
        parts.push(format!(
            "collection cancelled for {}",
            stats.cancelled_services.join(", ")
        ));
    }
    Some(format!("Partial data: {}", parts.join("; ")))
}
