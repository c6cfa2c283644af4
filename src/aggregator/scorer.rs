//! Severity scoring for incident clusters
//!
//! A cluster's score is the sum of three capped factors:
//! service fan-out (up to 40, saturating at 3 services), error density
//! (up to 40) and volume (up to 20, saturating at 20 signals).

use crate::aggregator::Cluster;
use serde::{Deserialize, Serialize};

const SERVICE_SATURATION: f64 = 3.0;
const VOLUME_SATURATION: f64 = 20.0;

const SERVICE_WEIGHT: f64 = 40.0;
const ERROR_WEIGHT: f64 = 40.0;
const VOLUME_WEIGHT: f64 = 20.0;

/// Score a cluster in the range [0, 100]
pub fn score(cluster: &Cluster) -> f64 {
    score_counts(cluster.services.len(), cluster.errors, cluster.signals.len())
}

/// Score from raw counts, used by [`score`]
pub fn score_counts(service_count: usize, error_count: usize, signal_count: usize) -> f64 {
    if signal_count == 0 {
        return 0.0;
    }

    let service_factor = (service_count as f64 / SERVICE_SATURATION).min(1.0) * SERVICE_WEIGHT;
    let error_factor = (error_count as f64 / signal_count as f64).min(1.0) * ERROR_WEIGHT;
    let volume_factor = (signal_count as f64 / VOLUME_SATURATION).min(1.0) * VOLUME_WEIGHT;

    (service_factor + error_factor + volume_factor).clamp(0.0, 100.0)
}

/// Coarse severity bucket for presenting a cluster score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ClusterSeverity {
    /// Score below 30
    Low,
    /// Score from 30 up to 60
    Medium,
    /// Score of 60 or more
    Critical,
}

impl ClusterSeverity {
    pub fn from_score(score: f64) -> Self {
        if score >= 60.0 {
            ClusterSeverity::Critical
        } else if score >= 30.0 {
            ClusterSeverity::Medium
        } else {
            ClusterSeverity::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ClusterSeverity::Low => "LOW",
            ClusterSeverity::Medium => "MEDIUM",
            ClusterSeverity::Critical => "CRITICAL",
        }
    }
}
