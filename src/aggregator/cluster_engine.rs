//! Temporal clustering of the sorted signal stream
//!
//! Signals are grouped with bucket-gap partitioning: a bucket is anchored at its
//! first signal and keeps accepting signals until one lands `bucket_seconds` or
//! more after the anchor. The anchor never moves: a signal only joins when it is
//! within `bucket_seconds` of the bucket's first signal, however close it is to
//! the previous one. Buckets smaller than `min_events` are dropped.

use crate::aggregator::scorer;
use crate::events::{Signal, Timestamp};
use chrono::Duration;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bucket width used when a non-positive value is supplied
pub const DEFAULT_BUCKET_SECONDS: i64 = 60;

/// Minimum cluster size used when zero is supplied
pub const DEFAULT_MIN_EVENTS: usize = 3;

/// A temporally contiguous group of signals treated as one candidate incident
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cluster {
    /// Timestamp of the first signal
    pub start: Timestamp,
    /// Timestamp of the last signal
    pub end: Timestamp,
    /// Member signals in timestamp order
    pub signals: Vec<Signal>,
    /// Signal count per service
    pub services: BTreeMap<String, usize>,
    /// Number of member signals flagged as errors
    pub errors: usize,
    /// Severity score in [0, 100]
    pub score: f64,
}

impl Cluster {
    /// Build a scored cluster from a non-empty run of sorted signals
    fn from_bucket(signals: Vec<Signal>) -> Self {
        let start = signals[0].timestamp;
        let end = signals[signals.len() - 1].timestamp;

        let mut services = BTreeMap::new();
        let mut errors = 0;
        for signal in &signals {
            *services.entry(signal.service.clone()).or_insert(0) += 1;
            if signal.is_error {
                errors += 1;
            }
        }

        let mut cluster = Self {
            start,
            end,
            signals,
            services,
            errors,
            score: 0.0,
        };
        cluster.score = scorer::score(&cluster);
        cluster
    }

    /// Time between the first and last member signal
    pub fn span(&self) -> Duration {
        self.end - self.start
    }
}

/// Partition a sorted signal stream into scored clusters
///
/// # Arguments
///
/// * `signals` - Signals sorted ascending by timestamp
/// * `bucket_seconds` - Maximum distance from a bucket's anchor; non-positive means 60
/// * `min_events` - Minimum signals for a bucket to become a cluster; zero means 3
///
/// # Returns
///
/// Clusters sorted by score descending. Equal scores keep their chronological order.
pub fn find_clusters(signals: &[Signal], bucket_seconds: i64, min_events: usize) -> Vec<Cluster> {
    debug_assert!(
        signals.windows(2).all(|w| w[0].timestamp <= w[1].timestamp),
        "signals must be sorted by timestamp"
    );

    let bucket_seconds = if bucket_seconds <= 0 {
        DEFAULT_BUCKET_SECONDS
    } else {
        bucket_seconds
    };
    let min_events = if min_events == 0 {
        DEFAULT_MIN_EVENTS
    } else {
        min_events
    };
    // widths too large for a TimeDelta put everything in one bucket
    let bucket_width = Duration::try_seconds(bucket_seconds).unwrap_or(Duration::MAX);

    let mut clusters = Vec::new();
    let mut anchor: Option<Timestamp> = None;
    let mut bucket: Vec<Signal> = Vec::new();

    for signal in signals {
        let opens_bucket = match anchor {
            None => true,
            Some(anchor) => signal.timestamp - anchor >= bucket_width,
        };

        if opens_bucket {
            if bucket.len() >= min_events {
                clusters.push(Cluster::from_bucket(std::mem::take(&mut bucket)));
            } else {
                bucket.clear();
            }
            anchor = Some(signal.timestamp);
        }
        bucket.push(signal.clone());
    }
    if bucket.len() >= min_events {
        clusters.push(Cluster::from_bucket(bucket));
    }

    debug!(
        "Formed {} clusters from {} signals (bucket={}s, min_events={})",
        clusters.len(),
        signals.len(),
        bucket_seconds,
        min_events
    );

    // Vec::sort_by is stable, so ties stay in chronological order
    clusters.sort_by(|a, b| b.score.total_cmp(&a.score));
    clusters
}
