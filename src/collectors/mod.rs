/// Per-service signal collection with bounded concurrency
pub mod signal_collector;

pub use signal_collector::{
    Collection, CollectionStats, CollectorSettings, FailedQuery, QueryKind, SignalCollector,
};
