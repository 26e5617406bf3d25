//! Per-task metric fetch.
//!
//! A single HTTP GET with a short timeout against the task's status
//! endpoint. The [`MetricSource`] trait is the seam the aggregator is
//! tested through.

use std::time::Duration;

use async_trait::async_trait;
use http_body_util::{BodyExt, Empty};
use tracing::debug;

use herdwatch_model::TaskMetrics;

use crate::error::FetchError;

/// Bound on one complete metrics round trip. A task slower than this
/// contributes nothing this tick.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(1);

/// Path every task serves its load record on.
const INFO_PATH: &str = "/info";

/// Something that can read one task's current load and capacity.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn fetch(&self, host: &str, port: u16) -> Result<TaskMetrics, FetchError>;
}

/// HTTP implementation of [`MetricSource`].
#[derive(Debug, Clone)]
pub struct HttpMetricFetcher {
    timeout: Duration,
}

impl HttpMetricFetcher {
    pub fn new() -> Self {
        Self {
            timeout: FETCH_TIMEOUT,
        }
    }

    /// Override the fetch timeout (for tests).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn fetch_inner(&self, address: &str) -> Result<TaskMetrics, FetchError> {
        let stream = tokio::net::TcpStream::connect(address)
            .await
            .map_err(|e| FetchError::Connect(address.to_string(), e.to_string()))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let uri = format!("http://{address}{INFO_PATH}");
        let req = http::Request::builder()
            .method("GET")
            .uri(&uri)
            .header("host", address)
            .header("user-agent", "herdwatch/0.1")
            .body(Empty::<bytes::Bytes>::new())
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?
            .to_bytes();

        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

impl Default for HttpMetricFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricSource for HttpMetricFetcher {
    async fn fetch(&self, host: &str, port: u16) -> Result<TaskMetrics, FetchError> {
        let address = format!("{host}:{port}");
        match tokio::time::timeout(self.timeout, self.fetch_inner(&address)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(%address, timeout = ?self.timeout, "metrics fetch timed out");
                Err(FetchError::Timeout(self.timeout))
            }
        }
    }
}
