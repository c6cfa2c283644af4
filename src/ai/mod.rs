/// AI narrative generation and backend implementations
pub mod analyzer;
pub mod backends;

pub use analyzer::{Narrative, NarrativeAnalyzer};
pub use backends::{AnthropicBackend, LLMBackend, MockBackend, OllamaBackend, OpenAIBackend};
