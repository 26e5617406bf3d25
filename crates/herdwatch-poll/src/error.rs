//! Error types for per-task metric fetches.

use std::time::Duration;

use thiserror::Error;

/// Why a single task's metrics could not be read.
///
/// Always recoverable: the instance is simply left out of the snapshot and
/// the next tick retries naturally. There is no retry inside the fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("connect to {0} failed: {1}")]
    Connect(String, String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("metrics payload not decodable: {0}")]
    Decode(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}
