use crate::ai::backends::{
    AnthropicBackend, LLMBackend, MockBackend, OllamaBackend, OpenAIBackend,
};
use crate::config::AIBackendConfig;
use crate::correlator::CorrelationResult;
use crate::error::AnalysisError;
use crate::events::Timestamp;
use crate::report::build_prompt;
use chrono::Utc;
use log::{debug, error, info};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Narrative produced for one correlation result
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Narrative {
    /// When the narrative was generated
    pub generated_at: Timestamp,
    /// Backend that wrote it
    pub backend: String,
    /// Markdown text returned by the model
    pub text: String,
    /// Wall-clock time of the backend call
    #[serde(skip)]
    pub latency: Duration,
}

/// Turns a correlation result into an incident narrative via an LLM backend
///
/// The analyzer builds the prompt from the result and hands it to the backend.
/// Runs without any signals are skipped without calling the backend.
pub struct NarrativeAnalyzer {
    backend: Arc<dyn LLMBackend>,
}

impl NarrativeAnalyzer {
    /// Create an analyzer with a specific LLM backend
    pub fn with_backend(backend: Arc<dyn LLMBackend>) -> Self {
        Self { backend }
    }

    /// Create an analyzer for the configured backend
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError` if the backend's HTTP client cannot be built.
    pub fn from_config(config: &AIBackendConfig) -> Result<Self, AnalysisError> {
        let backend: Arc<dyn LLMBackend> = match config {
            AIBackendConfig::Anthropic { api_key, model } => {
                Arc::new(AnthropicBackend::new(api_key.clone(), model.clone())?)
            }
            AIBackendConfig::OpenAI {
                api_key,
                model,
                base_url,
            } => match base_url {
                Some(url) => Arc::new(OpenAIBackend::with_base_url(
                    api_key.clone(),
                    model.clone(),
                    url.clone(),
                )?),
                None => Arc::new(OpenAIBackend::new(api_key.clone(), model.clone())?),
            },
            AIBackendConfig::Ollama { endpoint, model } => {
                Arc::new(OllamaBackend::new(endpoint.clone(), model.clone())?)
            }
            AIBackendConfig::Mock => Arc::new(MockBackend::success()),
        };
        Ok(Self::with_backend(backend))
    }

    /// Name of the backend in use
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Generate a narrative for `result`
    ///
    /// Returns `Ok(None)` when the result holds no signals, since there is
    /// nothing for the model to explain.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError` if the backend call fails.
    pub async fn narrate(
        &self,
        result: &CorrelationResult,
    ) -> Result<Option<Narrative>, AnalysisError> {
        if result.signals().is_empty() {
            info!("No signals to analyze, skipping AI narrative");
            return Ok(None);
        }

        let prompt = build_prompt(result);
        debug!(
            "Sending {} character prompt to {} backend",
            prompt.len(),
            self.backend.name()
        );

        let started = Instant::now();
        let outcome = self.backend.narrate(&prompt).await;
        let latency = started.elapsed();

        match outcome {
            Ok(text) => {
                info!(
                    "AI narrative from {} completed in {:.2}s",
                    self.backend.name(),
                    latency.as_secs_f64()
                );
                Ok(Some(Narrative {
                    generated_at: Utc::now(),
                    backend: self.backend.name().to_string(),
                    text,
                    latency,
                }))
            }
            Err(e) => {
                error!(
                    "AI narrative from {} failed after {:.2}s: {}",
                    self.backend.name(),
                    latency.as_secs_f64(),
                    e
                );
                Err(e)
            }
        }
    }
}
