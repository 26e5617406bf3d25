//! Wire and aggregation types.
//!
//! Field names follow the browser protocol (`max` = capacity, `ops` = current
//! load) where serde renames apply; Rust-side names stay descriptive.

use serde::{Deserialize, Serialize};

/// One running task instance as shown on the dashboard.
///
/// Built fresh every poll cycle from a successful metrics fetch; never
/// persisted. The id is the orchestrator-assigned task identifier, kept in
/// full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    /// Maximum operations the instance can serve.
    #[serde(rename = "max")]
    pub capacity: u64,
    /// Operations currently in flight.
    #[serde(rename = "ops")]
    pub load: u64,
}

/// Point-in-time view of the whole cluster.
///
/// `instance_count` is the orchestrator's reported task count and may exceed
/// `instances.len()` when some per-task fetches failed. Rebuilt as a fresh
/// value every tick; a new snapshot fully replaces the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub instances: Vec<Instance>,
    #[serde(rename = "nrOfInstances")]
    pub instance_count: u32,
}

/// The JSON record a task serves on its `/info` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetrics {
    pub max: u64,
    pub ops: u64,
}

/// Cluster-wide load and capacity, summed over successful fetches only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadTotals {
    pub load: u64,
    pub capacity: u64,
}

impl LoadTotals {
    /// Fold one instance's metrics into the totals.
    pub fn add(&mut self, metrics: &TaskMetrics) {
        self.load += metrics.ops;
        self.capacity += metrics.max;
    }

    /// Load as a fraction of capacity, or `None` when capacity is zero
    /// (undefined ratio, callers must take no action on it).
    pub fn ratio(&self) -> Option<f64> {
        if self.capacity == 0 {
            None
        } else {
            Some(self.load as f64 / self.capacity as f64)
        }
    }

    /// Remaining capacity. Saturates at zero if load somehow exceeds
    /// capacity.
    pub fn headroom(&self) -> u64 {
        self.capacity.saturating_sub(self.load)
    }
}
