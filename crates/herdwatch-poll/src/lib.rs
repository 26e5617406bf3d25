//! herdwatch-poll — builds the live cluster picture.
//!
//! Three pieces:
//!
//! - [`fetcher`]: one bounded HTTP GET against a task's `/info` endpoint.
//!   Any failure means "this instance contributes nothing", never a crash.
//! - [`aggregator`]: queries the orchestrator for the task list, fans the
//!   fetches out concurrently, and folds the successes into one
//!   `ClusterSnapshot` plus cluster-wide `LoadTotals`. Degrades gracefully
//!   at every step; `build_snapshot` cannot fail.
//! - [`poller`]: the single shared tick loop. One snapshot per tick,
//!   published to every connected viewer over a broadcast channel, with the
//!   totals handed to the scale controller on a side channel. Sessions only
//!   subscribe, so upstream load stays constant no matter how many browsers
//!   are watching.

pub mod aggregator;
pub mod error;
pub mod fetcher;
pub mod poller;

pub use aggregator::SnapshotAggregator;
pub use error::FetchError;
pub use fetcher::{HttpMetricFetcher, MetricSource};
pub use poller::Poller;
