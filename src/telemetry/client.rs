use crate::config::TelemetryConfig;
use crate::error::CollectorError;
use crate::events::{LogRecord, ServiceSummary, SpanRecord, TimeRange};
use crate::telemetry::{decode, TelemetryQuerier};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};

/// SigNoz backend for telemetry queries
///
/// Talks to the SigNoz query service over HTTP: the services endpoint for
/// service discovery and `query_range` for raw logs and spans.
pub struct SignozClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    api_version: String,
}

impl SignozClient {
    /// Create a client from the telemetry configuration
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::HttpError` if the HTTP client cannot be built.
    pub fn new(config: &TelemetryConfig) -> Result<Self, CollectorError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            api_version: config.api_version.clone(),
        })
    }

    fn services_url(&self) -> String {
        format!("{}/api/v1/services", self.base_url)
    }

    fn query_range_url(&self) -> String {
        format!("{}/api/{}/query_range", self.base_url, self.api_version)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("SIGNOZ-API-KEY", key),
            None => builder,
        }
    }

    /// Send a request and return the body of a successful response
    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Vec<u8>, CollectorError> {
        let response = self
            .request(builder)
            .send()
            .await
            .map_err(|e| CollectorError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(CollectorError::BadStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body.to_vec())
    }

    async fn query_range(&self, payload: &Value) -> Result<Vec<u8>, CollectorError> {
        debug!("POST {} {}", self.query_range_url(), payload);
        self.send(self.client.post(self.query_range_url()).json(payload))
            .await
    }
}

/// Build a raw builder-query payload for `query_range`
///
/// # Arguments
///
/// * `signal` - "logs" or "traces"
/// * `range` - Queried time range
/// * `limit` - Maximum rows to return
/// * `filter` - Filter expression, empty for none
pub fn build_query_payload(signal: &str, range: TimeRange, limit: usize, filter: &str) -> Value {
    let mut query = json!({
        "name": "A",
        "signal": signal,
        "stepInterval": 60,
        "disabled": false,
        "limit": limit,
        "order": [{"key": {"name": "timestamp"}, "direction": "desc"}],
    });
    if !filter.is_empty() {
        query["filter"] = json!({ "expression": filter });
    }

    json!({
        "start": range.start.timestamp_millis(),
        "end": range.end.timestamp_millis(),
        "requestType": "raw",
        "compositeQuery": {
            "queries": [{"type": "builder_query", "spec": query}]
        }
    })
}

/// Filter expression matching one service, optionally at one severity
pub fn service_filter(service: &str, severity: Option<&str>) -> String {
    let mut parts = Vec::new();
    if !service.is_empty() {
        parts.push(format!("service_name = '{}'", service.replace('\'', "\\'")));
    }
    if let Some(severity) = severity {
        parts.push(format!("severity_text = '{}'", severity));
    }
    parts.join(" AND ")
}

#[async_trait]
impl TelemetryQuerier for SignozClient {
    async fn list_services(&self) -> Result<Vec<ServiceSummary>, CollectorError> {
        let body = self.send(self.client.get(self.services_url())).await?;
        decode::parse_services(&body)
    }

    async fn query_error_logs(
        &self,
        service: &str,
        range: TimeRange,
        limit: usize,
    ) -> Result<Vec<LogRecord>, CollectorError> {
        let payload = build_query_payload(
            "logs",
            range,
            limit,
            &service_filter(service, Some("error")),
        );
        let body = self.query_range(&payload).await?;
        decode::parse_logs(&body)
    }

    async fn query_traces(
        &self,
        service: &str,
        range: TimeRange,
        limit: usize,
    ) -> Result<Vec<SpanRecord>, CollectorError> {
        let payload = build_query_payload(
            "traces",
            range,
            limit,
            &service_filter(service, None),
        );
        let body = self.query_range(&payload).await?;
        decode::parse_spans(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn telemetry_config(url: &str, api_key: Option<&str>) -> TelemetryConfig {
        TelemetryConfig {
            url: url.to_string(),
            api_key: api_key.map(str::to_string),
            api_version: "v5".to_string(),
            timeout_seconds: 5,
        }
    }

    #[test]
    fn test_client_urls() {
        let client = SignozClient::new(&telemetry_config("https://signoz.example.com/", None)).unwrap();
        assert_eq!(
            client.services_url(),
            "https://signoz.example.com/api/v1/services"
        );
        assert_eq!(
            client.query_range_url(),
            "https://signoz.example.com/api/v5/query_range"
        );
    }

    #[test]
    fn test_empty_api_key_is_ignored() {
        let client = SignozClient::new(&telemetry_config("http://localhost:8080", Some(""))).unwrap();
        assert!(client.api_key.is_none());

        let client =
            SignozClient::new(&telemetry_config("http://localhost:8080", Some("secret"))).unwrap();
        assert_eq!(client.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_build_query_payload() {
        let now = Utc.with_ymd_and_hms(2026, 2, 28, 10, 0, 0).unwrap();
        let range = TimeRange::ending_at(now, 30);
        let payload = build_query_payload("logs", range, 100, "service_name = 'api'");

        assert_eq!(payload["end"], now.timestamp_millis());
        assert_eq!(
            payload["start"],
            (now - Duration::minutes(30)).timestamp_millis()
        );
        assert_eq!(payload["requestType"], "raw");

        let spec = &payload["compositeQuery"]["queries"][0]["spec"];
        assert_eq!(spec["signal"], "logs");
        assert_eq!(spec["limit"], 100);
        assert_eq!(spec["filter"]["expression"], "service_name = 'api'");
        assert_eq!(spec["order"][0]["key"]["name"], "timestamp");
    }

    #[test]
    fn test_build_query_payload_without_filter() {
        let payload = build_query_payload("traces", TimeRange::ending_at(Utc::now(), 5), 10, "");
        let spec = &payload["compositeQuery"]["queries"][0]["spec"];
        assert!(spec.get("filter").is_none());
    }

    #[test]
    fn test_service_filter() {
        assert_eq!(
            service_filter("api", Some("error")),
            "service_name = 'api' AND severity_text = 'error'"
        );
        assert_eq!(service_filter("api", None), "service_name = 'api'");
        assert_eq!(service_filter("", None), "");
        assert_eq!(service_filter("o'neil", None), "service_name = 'o\\'neil'");
    }

    #[tokio::test]
    #[ignore = "Requires running SigNoz instance"]
    async fn test_signoz_client_integration() {
        let client = SignozClient::new(&telemetry_config("http://localhost:8080", None)).unwrap();
        match client.list_services().await {
            Ok(services) => println!("Services: {:?}", services),
            Err(e) => println!("Expected error (no SigNoz instance): {:?}", e),
        }
    }
}
