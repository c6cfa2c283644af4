/// TOML configuration file handling
#[allow(clippy::module_inception)]
mod config;

pub use self::config::{AIBackendConfig, AIConfig, Config, CorrelationConfig, TelemetryConfig};
