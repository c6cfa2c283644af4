/// Error types for the correlator
pub mod error;

/// Signal model and telemetry records
pub mod events;

/// Configuration management
pub mod config;

/// Telemetry backend interface and SigNoz client
pub mod telemetry;

/// Signal collection from telemetry backends
pub mod collectors;

/// Temporal clustering, severity scoring and propagation detection
pub mod aggregator;

/// Correlation runs and their results
pub mod correlator;

/// Terminal, markdown, JSON and prompt rendering
pub mod report;

/// AI narrative and backend implementations
pub mod ai;

// Re-export commonly used types
pub use correlator::{CorrelateOptions, CorrelationResult, Correlator};
pub use error::{AnalysisError, CollectorError, ConfigError, CorrelateError};
pub use events::{Signal, SignalSource, TimeRange};
