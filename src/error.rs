use thiserror::Error;

/// Errors returned by telemetry queries
///
/// A failed query only ever removes that service's signals from a run;
/// the collector logs it and carries on.
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Telemetry request failed: {0}")]
    RequestFailed(String),

    #[error("Telemetry backend returned status {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("Failed to parse telemetry response: {0}")]
    ParseError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Errors that can occur while generating an AI narrative
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Backend communication failed: {0}")]
    BackendError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Errors that abort a correlation run
#[derive(Error, Debug)]
pub enum CorrelateError {
    #[error("service {0:?} not found")]
    ServiceNotFound(String),

    #[error("listing services: {0}")]
    ListServices(#[source] CollectorError),
}
