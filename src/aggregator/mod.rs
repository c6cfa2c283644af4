/// Bucket-gap temporal clustering
pub mod cluster_engine;

/// Error propagation edge inference
pub mod propagation;

/// Cluster severity scoring
pub mod scorer;

pub use cluster_engine::{find_clusters, Cluster};
pub use propagation::{detect_propagation, PropagationEdge};
pub use scorer::{score, ClusterSeverity};
