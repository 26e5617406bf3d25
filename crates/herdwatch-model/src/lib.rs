//! herdwatch-model — domain types for the herdwatch dashboard.
//!
//! These types are the wire protocol: a `ClusterSnapshot` serialized to JSON
//! is exactly the text frame pushed to connected viewers, and `TaskMetrics`
//! is exactly the payload a task's `/info` endpoint returns. The serde
//! representation is therefore part of the public contract and must not
//! drift.

pub mod types;

pub use types::{ClusterSnapshot, Instance, LoadTotals, TaskMetrics};
