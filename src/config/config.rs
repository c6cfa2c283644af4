use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration loaded from a TOML file
///
/// Every section and field is optional; anything missing falls back to the
/// defaults below.
///
/// ```toml
/// [telemetry]
/// url = "https://signoz.example.com"
/// api_key = "..."
/// api_version = "v5"
///
/// [correlation]
/// duration_minutes = 30
/// bucket_seconds = 60
/// min_events = 3
///
/// [ai]
/// enabled = true
/// backend = { type = "ollama", endpoint = "http://localhost:11434", model = "llama3" }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub telemetry: TelemetryConfig,
    pub correlation: CorrelationConfig,
    pub ai: AIConfig,
}

/// Connection settings for the telemetry backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Base URL of the SigNoz query service
    pub url: String,
    /// Value for the SIGNOZ-API-KEY header
    pub api_key: Option<String>,
    /// "v3" for self-hosted, "v5" for cloud
    pub api_version: String,
    /// Per-request timeout
    pub timeout_seconds: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            api_key: None,
            api_version: "v3".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Analysis and collection parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Look-back window in minutes
    pub duration_minutes: u32,
    /// Cluster bucket width and propagation window, in seconds
    pub bucket_seconds: i64,
    /// Minimum signals per cluster
    pub min_events: usize,
    /// Maximum records per telemetry query
    pub query_limit: usize,
    /// Services queried at the same time
    pub max_concurrent_services: usize,
    /// Spans slower than this become signals even when successful
    pub slow_span_ms: f64,
    /// Longest signal summary before truncation
    pub summary_max_chars: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            duration_minutes: 60,
            bucket_seconds: 60,
            min_events: 3,
            query_limit: 100,
            max_concurrent_services: 4,
            slow_span_ms: 1000.0,
            summary_max_chars: 120,
        }
    }
}

/// AI narrative settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AIConfig {
    /// Generate a narrative after every run
    pub enabled: bool,
    pub backend: AIBackendConfig,
}

/// LLM backend selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AIBackendConfig {
    Anthropic {
        api_key: String,
        #[serde(default = "default_anthropic_model")]
        model: String,
    },
    OpenAI {
        api_key: String,
        model: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
    },
    Mock,
}

fn default_anthropic_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

impl Default for AIBackendConfig {
    fn default() -> Self {
        AIBackendConfig::Anthropic {
            api_key: String::new(),
            model: default_anthropic_model(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read,
    /// `ConfigError::TomlError` if it is not valid TOML for this schema, and
    /// `ConfigError::ValidationError` if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that the rest of the application relies on
    ///
    /// Cluster parameters are not checked here: non-positive values are
    /// replaced with defaults by the analysis itself.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let telemetry = &self.telemetry;
        if !telemetry.url.starts_with("http://") && !telemetry.url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "telemetry.url must be an http(s) URL, got {:?}",
                telemetry.url
            )));
        }
        if telemetry.api_version != "v3" && telemetry.api_version != "v5" {
            return Err(ConfigError::ValidationError(format!(
                "telemetry.api_version must be \"v3\" or \"v5\", got {:?}",
                telemetry.api_version
            )));
        }
        if telemetry.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "telemetry.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        let correlation = &self.correlation;
        if correlation.duration_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "correlation.duration_minutes must be greater than 0".to_string(),
            ));
        }
        if correlation.query_limit == 0 {
            return Err(ConfigError::ValidationError(
                "correlation.query_limit must be greater than 0".to_string(),
            ));
        }
        if correlation.max_concurrent_services == 0 {
            return Err(ConfigError::ValidationError(
                "correlation.max_concurrent_services must be greater than 0".to_string(),
            ));
        }
        if correlation.slow_span_ms.is_nan() || correlation.slow_span_ms < 0.0 {
            return Err(ConfigError::ValidationError(
                "correlation.slow_span_ms must not be negative".to_string(),
            ));
        }
        if correlation.summary_max_chars == 0 {
            return Err(ConfigError::ValidationError(
                "correlation.summary_max_chars must be greater than 0".to_string(),
            ));
        }

        if self.ai.enabled {
            match &self.ai.backend {
                AIBackendConfig::Anthropic { api_key, .. }
                | AIBackendConfig::OpenAI { api_key, .. }
                    if api_key.is_empty() =>
                {
                    return Err(ConfigError::ValidationError(
                        "ai.backend.api_key is required when ai is enabled".to_string(),
                    ));
                }
                AIBackendConfig::Ollama { endpoint, .. } if endpoint.is_empty() => {
                    return Err(ConfigError::ValidationError(
                        "ai.backend.endpoint is required for ollama".to_string(),
                    ));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.correlation.bucket_seconds, 60);
        assert_eq!(config.correlation.min_events, 3);
        assert_eq!(config.telemetry.api_version, "v3");
        assert!(!config.ai.enabled);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_config() {
        let config = Config::from_toml(
            r#"
            [telemetry]
            url = "https://signoz.example.com"
            api_key = "abc"
            api_version = "v5"

            [correlation]
            bucket_seconds = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.telemetry.url, "https://signoz.example.com");
        assert_eq!(config.telemetry.api_key.as_deref(), Some("abc"));
        assert_eq!(config.telemetry.timeout_seconds, 30);
        assert_eq!(config.correlation.bucket_seconds, 30);
        assert_eq!(config.correlation.min_events, 3);
    }

    #[test]
    fn test_ai_backend_variants() {
        let config = Config::from_toml(
            r#"
            [ai]
            enabled = true
            backend = { type = "ollama", endpoint = "http://localhost:11434", model = "llama3" }
            "#,
        )
        .unwrap();
        assert_eq!(
            config.ai.backend,
            AIBackendConfig::Ollama {
                endpoint: "http://localhost:11434".to_string(),
                model: "llama3".to_string(),
            }
        );

        let config = Config::from_toml(
            r#"
            [ai.backend]
            type = "anthropic"
            api_key = "sk-ant"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.ai.backend,
            AIBackendConfig::Anthropic {
                api_key: "sk-ant".to_string(),
                model: default_anthropic_model(),
            }
        );

        let config = Config::from_toml("[ai.backend]\ntype = \"mock\"\n").unwrap();
        assert_eq!(config.ai.backend, AIBackendConfig::Mock);
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            "[telemetry]\nurl = \"signoz:8080\"\n",
            "[telemetry]\napi_version = \"v4\"\n",
            "[telemetry]\ntimeout_seconds = 0\n",
            "[correlation]\nquery_limit = 0\n",
            "[correlation]\nmax_concurrent_services = 0\n",
            "[correlation]\nslow_span_ms = -1.0\n",
            "[ai]\nenabled = true\n",
        ];
        for case in cases {
            assert!(
                matches!(
                    Config::from_toml(case),
                    Err(ConfigError::ValidationError(_))
                ),
                "expected validation error for {:?}",
                case
            );
        }
    }

    #[test]
    fn test_cluster_parameters_not_validated() {
        let config =
            Config::from_toml("[correlation]\nbucket_seconds = -10\nmin_events = 0\n").unwrap();
        assert_eq!(config.correlation.bucket_seconds, -10);
        assert_eq!(config.correlation.min_events, 0);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Config::from_toml("[telemetry\nurl ="),
            Err(ConfigError::TomlError(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[correlation]\nduration_minutes = 15").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.correlation.duration_minutes, 15);
    }

    #[test]
    fn test_from_missing_file() {
        assert!(matches!(
            Config::from_file(Path::new("/nonexistent/correlator.toml")),
            Err(ConfigError::ReadError(_))
        ));
    }
}
