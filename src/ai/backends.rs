use crate::error::AnalysisError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for LLM backend implementations
///
/// A backend turns a fully built prompt into narrative text.
pub trait LLMBackend: Send + Sync {
    fn narrate<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AnalysisError>> + Send + 'a>>;

    /// Short name used in log messages
    fn name(&self) -> &'static str;
}

/// System prompt shared by all HTTP backends
pub const SYSTEM_PROMPT: &str = "\
You are an experienced Site Reliability Engineer reviewing correlated logs and traces \
collected from SigNoz.

Your job:
- Explain what the data shows and which failures matter most
- Point out the most likely root cause and how the impact spread
- Recommend concrete remediation and follow-up investigation
- Keep the language technical and concise

Structure the answer in markdown sections.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_TOKENS: u32 = 4096;

fn http_client() -> Result<Client, AnalysisError> {
    Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

fn request_error(e: reqwest::Error) -> AnalysisError {
    if e.is_timeout() {
        AnalysisError::Timeout
    } else {
        AnalysisError::HttpError(e)
    }
}

/// Send a JSON request and decode a successful JSON response
async fn post_json<Req, Resp>(
    request: reqwest::RequestBuilder,
    body: &Req,
    backend: &str,
) -> Result<Resp, AnalysisError>
where
    Req: Serialize + ?Sized,
    Resp: for<'de> Deserialize<'de>,
{
    let response = request.json(body).send().await.map_err(request_error)?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(AnalysisError::BackendError(format!(
            "{} API returned error {}: {}",
            backend, status, error_text
        )));
    }

    response.json().await.map_err(|e| {
        AnalysisError::InvalidResponse(format!("Failed to parse {} response: {}", backend, e))
    })
}

/// Anthropic backend using the messages API
pub struct AnthropicBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContent>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

/// Error object shared by the Anthropic and OpenAI response formats
#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(rename = "type", default)]
    error_type: String,
}

impl AnthropicBackend {
    pub const API_VERSION: &'static str = "2023-06-01";

    /// Create a new Anthropic backend
    ///
    /// # Arguments
    /// * `api_key` - Anthropic API key
    /// * `model` - Model name (e.g., "claude-sonnet-4-20250514")
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::HttpError` if the HTTP client cannot be built.
    pub fn new(api_key: String, model: String) -> Result<Self, AnalysisError> {
        Self::with_base_url(api_key, model, "https://api.anthropic.com".to_string())
    }

    /// Create a backend against a custom API base URL
    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: String,
    ) -> Result<Self, AnalysisError> {
        Ok(Self {
            client: http_client()?,
            api_key,
            model,
            base_url,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> AnthropicRequest<'a> {
        AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: SYSTEM_PROMPT,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        }
    }

    /// Join the text blocks of a messages API response
    fn extract_text(response: AnthropicResponse) -> Result<String, AnalysisError> {
        if let Some(error) = response.error {
            return Err(AnalysisError::BackendError(format!(
                "Anthropic API error ({}): {}",
                error.error_type, error.message
            )));
        }

        let text: String = response
            .content
            .into_iter()
            .filter(|block| block.content_type == "text")
            .map(|block| block.text)
            .collect();

        if text.trim().is_empty() {
            return Err(AnalysisError::InvalidResponse(
                "No text content in Anthropic response".to_string(),
            ));
        }
        Ok(text)
    }
}

impl LLMBackend for AnthropicBackend {
    fn narrate<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AnalysisError>> + Send + 'a>> {
        Box::pin(async move {
            let request = self
                .client
                .post(self.api_url())
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", Self::API_VERSION);

            let response: AnthropicResponse =
                post_json(request, &self.build_request(prompt), "Anthropic").await?;
            Self::extract_text(response)
        })
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

/// OpenAI backend using the chat completions API
///
/// Works with any OpenAI-compatible endpoint through `with_base_url`.
pub struct OpenAIBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: String,
}

impl OpenAIBackend {
    /// Create a new OpenAI backend
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API key
    /// * `model` - Model name to use (e.g., "gpt-4o")
    pub fn new(api_key: String, model: String) -> Result<Self, AnalysisError> {
        Self::with_base_url(api_key, model, "https://api.openai.com/v1".to_string())
    }

    /// Create a new OpenAI backend with custom base URL
    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: String,
    ) -> Result<Self, AnalysisError> {
        Ok(Self {
            client: http_client()?,
            api_key,
            model,
            base_url,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> OpenAIRequest<'a> {
        OpenAIRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.2,
            max_tokens: MAX_TOKENS,
        }
    }

    fn extract_text(response: OpenAIResponse) -> Result<String, AnalysisError> {
        if let Some(error) = response.error {
            return Err(AnalysisError::BackendError(format!(
                "OpenAI API error ({}): {}",
                error.error_type, error.message
            )));
        }

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                AnalysisError::InvalidResponse("No choices in OpenAI response".to_string())
            })
    }
}

impl LLMBackend for OpenAIBackend {
    fn narrate<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AnalysisError>> + Send + 'a>> {
        Box::pin(async move {
            let request = self
                .client
                .post(self.api_url())
                .header("Authorization", format!("Bearer {}", self.api_key));

            let response: OpenAIResponse =
                post_json(request, &self.build_request(prompt), "OpenAI").await?;
            Self::extract_text(response)
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Ollama backend for local inference
pub struct OllamaBackend {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    ///
    /// # Arguments
    /// * `endpoint` - Ollama server URL (e.g., "http://localhost:11434")
    /// * `model` - Model name to use (e.g., "llama3")
    pub fn new(endpoint: String, model: String) -> Result<Self, AnalysisError> {
        Ok(Self {
            client: http_client()?,
            endpoint,
            model,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/api/generate", self.endpoint.trim_end_matches('/'))
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> OllamaRequest<'a> {
        OllamaRequest {
            model: &self.model,
            system: SYSTEM_PROMPT,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: 0.2,
                num_predict: MAX_TOKENS,
            },
        }
    }

    fn extract_text(response: OllamaResponse) -> Result<String, AnalysisError> {
        if let Some(error) = response.error {
            return Err(AnalysisError::BackendError(format!(
                "Ollama error: {}",
                error
            )));
        }
        if response.response.trim().is_empty() {
            return Err(AnalysisError::InvalidResponse(
                "Empty response from Ollama".to_string(),
            ));
        }
        Ok(response.response)
    }
}

impl LLMBackend for OllamaBackend {
    fn narrate<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AnalysisError>> + Send + 'a>> {
        Box::pin(async move {
            let request = self.client.post(self.api_url());
            let response: OllamaResponse =
                post_json(request, &self.build_request(prompt), "Ollama").await?;
            Self::extract_text(response)
        })
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

/// Scripted reply of a [`MockBackend`]
#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Failure(String),
    Timeout,
}

impl MockReply {
    fn to_result(&self) -> Result<String, AnalysisError> {
        match self {
            MockReply::Text(text) => Ok(text.clone()),
            MockReply::Failure(message) => Err(AnalysisError::BackendError(message.clone())),
            MockReply::Timeout => Err(AnalysisError::Timeout),
        }
    }
}

/// Mock backend for testing and offline runs
///
/// Replies are returned in order, cycling back to the first after the last.
/// Every call is counted and its prompt remembered.
#[derive(Clone)]
pub struct MockBackend {
    replies: Vec<MockReply>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    fn scripted(replies: Vec<MockReply>) -> Self {
        Self {
            replies,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always reply with `text`
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::scripted(vec![MockReply::Text(text.into())])
    }

    /// Reply with each text in turn
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::scripted(texts.into_iter().map(|t| MockReply::Text(t.into())).collect())
    }

    /// Canned narrative used when the mock backend is configured
    pub fn success() -> Self {
        Self::with_text(
            "## Incident Summary\n\nMock narrative: correlated failures detected across services.",
        )
    }

    /// Always fail with a backend error
    pub fn error(message: impl Into<String>) -> Self {
        Self::scripted(vec![MockReply::Failure(message.into())])
    }

    /// Always fail with a timeout
    pub fn timeout() -> Self {
        Self::scripted(vec![MockReply::Timeout])
    }

    /// Delay every reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of narrate calls so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    /// Prompt of the most recent call
    pub fn last_prompt(&self) -> Option<String> {
        self.calls
            .lock()
            .ok()
            .and_then(|calls| calls.last().cloned())
    }
}

impl LLMBackend for MockBackend {
    fn narrate<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AnalysisError>> + Send + 'a>> {
        Box::pin(async move {
            let index = match self.calls.lock() {
                Ok(mut calls) => {
                    calls.push(prompt.to_string());
                    calls.len() - 1
                }
                Err(_) => {
                    return Err(AnalysisError::BackendError(
                        "mock call log poisoned".to_string(),
                    ))
                }
            };

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            match self.replies.get(index % self.replies.len().max(1)) {
                Some(reply) => reply.to_result(),
                None => Err(AnalysisError::BackendError(
                    "mock backend has no replies".to_string(),
                )),
            }
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_urls() {
        let anthropic = AnthropicBackend::new("key".to_string(), "claude".to_string()).unwrap();
        assert_eq!(anthropic.api_url(), "https://api.anthropic.com/v1/messages");

        let openai = OpenAIBackend::with_base_url(
            "key".to_string(),
            "gpt-4o".to_string(),
            "http://localhost:8000/v1/".to_string(),
        )
        .unwrap();
        assert_eq!(openai.api_url(), "http://localhost:8000/v1/chat/completions");

        let ollama =
            OllamaBackend::new("http://localhost:11434/".to_string(), "llama3".to_string())
                .unwrap();
        assert_eq!(ollama.api_url(), "http://localhost:11434/api/generate");
    }

    #[test]
    fn test_anthropic_request_serialization() {
        let backend =
            AnthropicBackend::new("key".to_string(), "claude-sonnet-4-20250514".to_string())
                .unwrap();
        let value = serde_json::to_value(backend.build_request("what happened?")).unwrap();

        assert_eq!(value["model"], "claude-sonnet-4-20250514");
        assert_eq!(value["max_tokens"], 4096);
        assert_eq!(value["system"], SYSTEM_PROMPT);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "what happened?");
    }

    #[test]
    fn test_anthropic_text_extraction() {
        let response: AnthropicResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "content": [
                {"type": "text", "text": "## Summary\n"},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "db failed first."}
            ]
        }))
        .unwrap();
        assert_eq!(
            AnthropicBackend::extract_text(response).unwrap(),
            "## Summary\ndb failed first."
        );

        let empty: AnthropicResponse = serde_json::from_value(json!({"content": []})).unwrap();
        assert!(matches!(
            AnthropicBackend::extract_text(empty),
            Err(AnalysisError::InvalidResponse(_))
        ));

        let error: AnthropicResponse = serde_json::from_value(json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        }))
        .unwrap();
        match AnthropicBackend::extract_text(error) {
            Err(AnalysisError::BackendError(msg)) => {
                assert!(msg.contains("overloaded_error"));
                assert!(msg.contains("Overloaded"));
            }
            other => panic!("expected backend error, got {:?}", other),
        }
    }

    #[test]
    fn test_openai_request_and_response() {
        let backend = OpenAIBackend::new("key".to_string(), "gpt-4o".to_string()).unwrap();
        let value = serde_json::to_value(backend.build_request("prompt")).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "prompt");
        assert_eq!(value["max_tokens"], 4096);

        let response: OpenAIResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "narrative"}}]
        }))
        .unwrap();
        assert_eq!(OpenAIBackend::extract_text(response).unwrap(), "narrative");

        let response: OpenAIResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            OpenAIBackend::extract_text(response),
            Err(AnalysisError::InvalidResponse(_))
        ));

        let response: OpenAIResponse = serde_json::from_value(json!({
            "error": {"message": "Invalid API key", "type": "invalid_request_error"}
        }))
        .unwrap();
        assert!(matches!(
            OpenAIBackend::extract_text(response),
            Err(AnalysisError::BackendError(_))
        ));
    }

    #[test]
    fn test_ollama_request_and_response() {
        let backend =
            OllamaBackend::new("http://localhost:11434".to_string(), "llama3".to_string())
                .unwrap();
        let value = serde_json::to_value(backend.build_request("prompt")).unwrap();
        assert_eq!(value["stream"], false);
        assert_eq!(value["system"], SYSTEM_PROMPT);
        assert_eq!(value["options"]["num_predict"], 4096);

        let response: OllamaResponse =
            serde_json::from_value(json!({"response": "text", "done": true})).unwrap();
        assert_eq!(OllamaBackend::extract_text(response).unwrap(), "text");

        let response: OllamaResponse =
            serde_json::from_value(json!({"error": "model not found"})).unwrap();
        assert!(matches!(
            OllamaBackend::extract_text(response),
            Err(AnalysisError::BackendError(_))
        ));
    }

    #[tokio::test]
    #[ignore = "Requires local Ollama server"]
    async fn test_ollama_backend_integration() {
        let backend =
            OllamaBackend::new("http://localhost:11434".to_string(), "llama3".to_string())
                .unwrap();
        match backend.narrate("Say hello").await {
            Ok(text) => println!("Narrative: {}", text),
            Err(e) => println!("Expected error (no Ollama server): {:?}", e),
        }
    }
}
