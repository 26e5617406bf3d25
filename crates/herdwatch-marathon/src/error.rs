//! Error types for orchestrator calls.

use std::time::Duration;

use thiserror::Error;

/// Errors from talking to the orchestrator.
///
/// All of these are recoverable from the control loop's point of view: a
/// failed query degrades the snapshot to empty, a failed scale request is
/// logged and its cooldown window is still consumed.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid orchestrator URL {0:?}")]
    InvalidUrl(String),

    #[error("connect to {0} failed: {1}")]
    Connect(String, String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("response not decodable: {0}")]
    Decode(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}
