//! Error propagation inference between services
//!
//! Looks at error signals only. Every time an error in service A is followed by an
//! error in a different service B within the window, the pair counts as evidence
//! for an A -> B edge. Edges backed by a single pair are dropped as coincidence.

use crate::events::Signal;
use chrono::Duration;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Window used when a non-positive value is supplied
pub const DEFAULT_WINDOW_SECONDS: i64 = 60;

/// Minimum number of correlated pairs for an edge to be reported
pub const MIN_EDGE_SUPPORT: usize = 2;

/// Inferred directed link between two services
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropagationEdge {
    /// Service whose error came first
    pub from: String,
    /// Service whose error followed
    pub to: String,
    /// Average delay between the paired errors, in milliseconds
    pub delay_ms: f64,
    /// Number of correlated error pairs
    pub count: usize,
    /// Fraction (0-1) of the `to` service's errors that follow a `from` error
    pub error_rate: f64,
}

#[derive(Default)]
struct EdgeAccumulator {
    count: usize,
    delay_sum_ms: i64,
    followers: BTreeSet<usize>,
}

/// Infer propagation edges from a sorted signal stream
///
/// # Arguments
///
/// * `signals` - Signals sorted ascending by timestamp
/// * `window_seconds` - Maximum delay between paired errors; non-positive means 60
///
/// # Returns
///
/// Edges with at least two supporting pairs, sorted by `count` descending.
/// Edges with equal counts are ordered by service names.
pub fn detect_propagation(signals: &[Signal], window_seconds: i64) -> Vec<PropagationEdge> {
    debug_assert!(
        signals.windows(2).all(|w| w[0].timestamp <= w[1].timestamp),
        "signals must be sorted by timestamp"
    );

    let window_seconds = if window_seconds <= 0 {
        DEFAULT_WINDOW_SECONDS
    } else {
        window_seconds
    };
    // windows too large for a TimeDelta cover the whole run
    let window = Duration::try_seconds(window_seconds).unwrap_or(Duration::MAX);

    let errors: Vec<&Signal> = signals.iter().filter(|s| s.is_error).collect();
    if errors.len() < 2 {
        return Vec::new();
    }

    let mut errors_per_service: HashMap<&str, usize> = HashMap::new();
    for error in &errors {
        *errors_per_service.entry(error.service.as_str()).or_insert(0) += 1;
    }

    let mut edges: BTreeMap<(&str, &str), EdgeAccumulator> = BTreeMap::new();

    for (i, earlier) in errors.iter().enumerate() {
        for (j, later) in errors.iter().enumerate().skip(i + 1) {
            let delay = later.timestamp - earlier.timestamp;
            if delay > window {
                // sorted input: nothing further can be inside the window
                break;
            }
            if delay <= Duration::zero() || earlier.service == later.service {
                continue;
            }

            let edge = edges
                .entry((earlier.service.as_str(), later.service.as_str()))
                .or_default();
            edge.count += 1;
            edge.delay_sum_ms += delay.num_milliseconds();
            edge.followers.insert(j);
        }
    }

    let mut result: Vec<PropagationEdge> = edges
        .into_iter()
        .filter(|(_, acc)| acc.count >= MIN_EDGE_SUPPORT)
        .map(|((from, to), acc)| {
            let to_errors = errors_per_service.get(to).copied().unwrap_or(0);
            let error_rate = if to_errors > 0 {
                acc.followers.len() as f64 / to_errors as f64
            } else {
                0.0
            };
            PropagationEdge {
                from: from.to_string(),
                to: to.to_string(),
                delay_ms: acc.delay_sum_ms as f64 / acc.count as f64,
                count: acc.count,
                error_rate,
            }
        })
        .collect();

    result.sort_by(|a, b| b.count.cmp(&a.count));

    debug!(
        "Inferred {} propagation edges from {} error signals (window={}s)",
        result.len(),
        errors.len(),
        window_seconds
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::cluster_engine::tests::signal_at;

    fn find<'a>(edges: &'a [PropagationEdge], from: &str, to: &str) -> Option<&'a PropagationEdge> {
        edges.iter().find(|e| e.from == from && e.to == to)
    }

    #[test]
    fn test_db_errors_propagate_to_api() {
        let signals = vec![
            signal_at(0, "db", true),
            signal_at(100, "api", true),
            signal_at(1_000, "db", true),
            signal_at(1_100, "api", true),
            signal_at(2_000, "db", true),
            signal_at(2_100, "api", true),
        ];

        let edges = detect_propagation(&signals, 60);
        assert!(!edges.is_empty());

        let edge = find(&edges, "db", "api").expect("expected db -> api edge");
        assert_eq!(edge.count, 6);
        assert!(edge.count >= 3);
        assert_eq!(edges[0].from, "db");
        // every api error follows some db error
        assert_eq!(edge.error_rate, 1.0);
        // delays: 100, 1100, 2100, 100, 1100, 100
        assert!((edge.delay_ms - 4600.0 / 6.0).abs() < 1e-9);

        let reverse = find(&edges, "api", "db").expect("expected api -> db edge");
        assert_eq!(reverse.count, 3);
        // only the db errors at 1s and 2s follow an api error
        assert!((reverse.error_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_service_pairs_ignored() {
        let signals = vec![signal_at(0, "api", true), signal_at(50, "api", true)];
        assert!(detect_propagation(&signals, 60).is_empty());
    }

    #[test]
    fn test_single_pair_is_noise() {
        let signals = vec![signal_at(0, "db", true), signal_at(100, "api", true)];
        assert!(detect_propagation(&signals, 60).is_empty());
    }

    #[test]
    fn test_non_error_signals_ignored() {
        let signals = vec![
            signal_at(0, "db", false),
            signal_at(100, "api", false),
            signal_at(200, "db", false),
            signal_at(300, "api", false),
        ];
        assert!(detect_propagation(&signals, 60).is_empty());
    }

    #[test]
    fn test_simultaneous_errors_do_not_pair() {
        let signals = vec![
            signal_at(0, "db", true),
            signal_at(0, "api", true),
            signal_at(1_000, "db", true),
            signal_at(1_000, "api", true),
        ];

        let edges = detect_propagation(&signals, 60);
        // only the cross-second pairs count: db@0->api@1s, api@0->db@1s
        assert!(edges.is_empty());
    }

    #[test]
    fn test_pairs_outside_window_ignored() {
        let signals = vec![
            signal_at(0, "db", true),
            signal_at(120_000, "api", true),
            signal_at(240_000, "db", true),
            signal_at(360_000, "api", true),
        ];
        assert!(detect_propagation(&signals, 60).is_empty());
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let signals = vec![
            signal_at(0, "db", true),
            signal_at(60_000, "api", true),
            signal_at(200_000, "db", true),
            signal_at(260_000, "api", true),
        ];

        let edges = detect_propagation(&signals, 60);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].count, 2);
        assert_eq!(edges[0].delay_ms, 60_000.0);
    }

    #[test]
    fn test_huge_window_is_unbounded() {
        let signals = vec![
            signal_at(0, "db", true),
            signal_at(100, "api", true),
            signal_at(1_000, "db", true),
            signal_at(1_100, "api", true),
        ];

        let edges = detect_propagation(&signals, i64::MAX / 1000 + 1);
        assert_eq!(edges.len(), 1);
        let edge = find(&edges, "db", "api").expect("expected db -> api edge");
        // db@0 -> api@100, db@0 -> api@1100, db@1000 -> api@1100
        assert_eq!(edge.count, 3);

        assert_eq!(detect_propagation(&signals, i64::MAX).len(), 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(detect_propagation(&[], 60).is_empty());
        assert!(detect_propagation(&[], 0).is_empty());
    }
}

// Property-based tests
#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::aggregator::cluster_engine::tests::signal_at;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    /// Sorted stream of mostly-error signals across a few services
    #[derive(Debug, Clone)]
    struct ErrorStream(Vec<Signal>);

    impl Arbitrary for ErrorStream {
        fn arbitrary(g: &mut Gen) -> Self {
            let services = ["api", "db", "cache"];
            let size = usize::arbitrary(g) % 40;
            let mut offsets: Vec<i64> = (0..size)
                .map(|_| (u32::arbitrary(g) % 180_000) as i64)
                .collect();
            offsets.sort_unstable();

            let signals = offsets
                .into_iter()
                .map(|offset| {
                    let service = g.choose(&services).copied().unwrap_or("api");
                    signal_at(offset, service, u8::arbitrary(g) % 4 != 0)
                })
                .collect();
            ErrorStream(signals)
        }
    }

    #[quickcheck]
    fn prop_no_self_edges(stream: ErrorStream, window: u8) -> bool {
        detect_propagation(&stream.0, window as i64)
            .iter()
            .all(|e| e.from != e.to)
    }

    #[quickcheck]
    fn prop_minimum_support(stream: ErrorStream, window: u8) -> bool {
        detect_propagation(&stream.0, window as i64)
            .iter()
            .all(|e| e.count >= MIN_EDGE_SUPPORT)
    }

    #[quickcheck]
    fn prop_sorted_by_count(stream: ErrorStream, window: u8) -> bool {
        detect_propagation(&stream.0, window as i64)
            .windows(2)
            .all(|w| w[0].count >= w[1].count)
    }

    #[quickcheck]
    fn prop_error_rate_is_fraction(stream: ErrorStream, window: u8) -> bool {
        detect_propagation(&stream.0, window as i64)
            .iter()
            .all(|e| e.error_rate > 0.0 && e.error_rate <= 1.0)
    }

    #[quickcheck]
    fn prop_detection_is_idempotent(stream: ErrorStream, window: u8) -> bool {
        let first = detect_propagation(&stream.0, window as i64);
        let second = detect_propagation(&stream.0, window as i64);
        serde_json::to_string(&first).unwrap() == serde_json::to_string(&second).unwrap()
    }
}
