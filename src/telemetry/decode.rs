//! Decoding of SigNoz query_range responses
//!
//! The backend answers in several shapes depending on version and request type:
//! results may sit under `data` or `result`, inside a `result`/`results` list of
//! query items carrying `list` rows, or directly as a flat array of rows. Rows can
//! wrap their fields in a nested `data` object and use camelCase or snake_case keys.
//! The services endpoint answers with a bare array or a `data` envelope.
//! Everything here works on `serde_json::Value` and produces typed records.

use crate::error::CollectorError;
use crate::events::{LogRecord, ServiceSummary, SpanRecord, Timestamp};
use chrono::{DateTime, TimeZone, Utc};
use log::debug;
use serde_json::{Map, Value};

type Row = Map<String, Value>;

/// Parse a raw response body into log records
pub fn parse_logs(body: &[u8]) -> Result<Vec<LogRecord>, CollectorError> {
    let response = parse_body(body)?;
    Ok(rows(&response).into_iter().filter_map(log_from_row).collect())
}

/// Parse a raw response body into span records
pub fn parse_spans(body: &[u8]) -> Result<Vec<SpanRecord>, CollectorError> {
    let response = parse_body(body)?;
    Ok(rows(&response).into_iter().filter_map(span_from_row).collect())
}

/// Parse a services response body into service summaries
///
/// Entries without a service name are skipped.
pub fn parse_services(body: &[u8]) -> Result<Vec<ServiceSummary>, CollectorError> {
    let response: Value = serde_json::from_slice(body)
        .map_err(|e| CollectorError::ParseError(format!("invalid services response: {}", e)))?;

    let entries = match response.get("data").unwrap_or(&response) {
        Value::Array(entries) => entries,
        _ => {
            return Err(CollectorError::ParseError(
                "services response is not a list".to_string(),
            ))
        }
    };

    Ok(entries
        .iter()
        .filter_map(Value::as_object)
        .filter_map(service_from_row)
        .collect())
}

fn service_from_row(row: &Row) -> Option<ServiceSummary> {
    let name = match str_field(row, &["serviceName", "service_name"]) {
        Some(name) if !name.is_empty() => name,
        _ => {
            debug!("Skipping service entry without a name");
            return None;
        }
    };

    let counter = |keys: &[&str]| num_field(row, keys).map_or(0, |n| n.max(0.0) as u64);

    Some(ServiceSummary {
        name: name.to_string(),
        call_count: counter(&["numCalls", "num_calls"]),
        error_count: counter(&["numErrors", "num_errors"]),
        reported_error_rate: num_field(row, &["errorRate", "error_rate"]),
    })
}

fn parse_body(body: &[u8]) -> Result<Value, CollectorError> {
    serde_json::from_slice(body)
        .map_err(|e| CollectorError::ParseError(format!("invalid query_range response: {}", e)))
}

/// Collect every row in the response regardless of envelope shape
fn rows(response: &Value) -> Vec<&Row> {
    let payload = match response.get("data").or_else(|| response.get("result")) {
        Some(payload) => payload,
        None => return Vec::new(),
    };

    // v3 wraps results once more: {"data": {"result": [...]}}
    let payload = match payload {
        Value::Object(obj) => match obj.get("result").or_else(|| obj.get("results")) {
            Some(inner) => inner,
            None => return Vec::new(),
        },
        other => other,
    };

    let items = match payload.as_array() {
        Some(items) => items,
        None => return Vec::new(),
    };

    let listed: Vec<&Row> = items
        .iter()
        .filter_map(|item| item.get("list").and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_object)
        .collect();
    if !listed.is_empty() {
        return listed;
    }

    items
        .iter()
        .filter_map(Value::as_object)
        .filter(|row| !row.contains_key("queryName"))
        .collect()
}

fn str_field<'a>(row: &'a Row, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| row.get(*key).and_then(Value::as_str))
}

fn num_field(row: &Row, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match row.get(*key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

/// Fields of a row, looking through a nested `data` object when present
fn fields(row: &Row) -> &Row {
    row.get("data").and_then(Value::as_object).unwrap_or(row)
}

/// Parse an RFC 3339 string or a numeric epoch timestamp
///
/// Numeric values are interpreted by magnitude: nanoseconds, microseconds,
/// milliseconds or seconds.
pub fn parse_timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<f64>().ok().and_then(epoch_to_timestamp)),
        Value::Number(n) => n.as_f64().and_then(epoch_to_timestamp),
        _ => None,
    }
}

fn epoch_to_timestamp(raw: f64) -> Option<Timestamp> {
    let nanos = if raw >= 1e17 {
        raw
    } else if raw >= 1e14 {
        raw * 1e3
    } else if raw >= 1e11 {
        raw * 1e6
    } else {
        raw * 1e9
    };
    Some(Utc.timestamp_nanos(nanos as i64))
}

fn row_timestamp(row: &Row, inner: &Row) -> Option<Timestamp> {
    inner
        .get("timestamp")
        .and_then(parse_timestamp)
        .or_else(|| row.get("timestamp").and_then(parse_timestamp))
}

fn log_from_row(row: &Row) -> Option<LogRecord> {
    let inner = fields(row);
    let timestamp = match row_timestamp(row, inner) {
        Some(ts) => ts,
        None => {
            debug!("Skipping log row without a usable timestamp");
            return None;
        }
    };

    Some(LogRecord {
        timestamp,
        body: str_field(inner, &["body"]).unwrap_or_default().to_string(),
        service: str_field(inner, &["service_name", "serviceName"])
            .unwrap_or_default()
            .to_string(),
        severity_text: str_field(inner, &["severity_text", "severityText"])
            .unwrap_or_default()
            .to_string(),
    })
}

fn span_from_row(row: &Row) -> Option<SpanRecord> {
    let inner = fields(row);
    let timestamp = match row_timestamp(row, inner) {
        Some(ts) => ts,
        None => {
            debug!("Skipping span row without a usable timestamp");
            return None;
        }
    };

    let duration_nano = num_field(inner, &["durationNano", "duration_nano"]).unwrap_or(0.0);

    Some(SpanRecord {
        timestamp,
        service: str_field(inner, &["serviceName", "service_name"])
            .unwrap_or_default()
            .to_string(),
        operation_name: str_field(inner, &["name", "operationName", "operation_name"])
            .unwrap_or_default()
            .to_string(),
        duration_ms: duration_nano / 1e6,
        status_code: str_field(inner, &["statusCode", "status_code", "statusCodeString"])
            .map(str::to_string)
            .or_else(|| num_field(inner, &["statusCode", "status_code"]).map(|c| c.to_string()))
            .unwrap_or_default(),
    })
}
