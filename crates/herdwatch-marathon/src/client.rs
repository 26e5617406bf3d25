//! HTTP client for the Marathon `/v2/apps` API.
//!
//! One short-lived http1 connection per call. Queries and scale requests
//! both run on a poll cadence measured in seconds, so connection reuse buys
//! nothing and a dead orchestrator is noticed immediately.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use serde::Deserialize;
use tracing::debug;

use crate::error::OrchestratorError;
use crate::{Application, Orchestrator};

/// Bound on one complete orchestrator round trip.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Marathon envelope around a single application.
#[derive(Deserialize)]
struct AppEnvelope {
    app: Application,
}

/// Marathon client speaking plain HTTP to a fixed base address.
#[derive(Debug, Clone)]
pub struct MarathonClient {
    /// `host:port` of the Marathon master.
    authority: String,
    timeout: Duration,
}

impl MarathonClient {
    /// Create a client from a base URL like `http://172.17.0.1:8080`.
    pub fn new(base_url: &str) -> Result<Self, OrchestratorError> {
        let rest = base_url
            .strip_prefix("http://")
            .ok_or_else(|| OrchestratorError::InvalidUrl(base_url.to_string()))?;
        let authority = rest.split('/').next().unwrap_or_default();
        if authority.is_empty() {
            return Err(OrchestratorError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            authority: authority.to_string(),
            timeout: REQUEST_TIMEOUT,
        })
    }

    /// Override the per-request timeout (for tests).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Issue one request and collect the response body.
    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Bytes,
    ) -> Result<(u16, Bytes), OrchestratorError> {
        let timeout = self.timeout;
        let fut = async {
            let stream = tokio::net::TcpStream::connect(&self.authority)
                .await
                .map_err(|e| OrchestratorError::Connect(self.authority.clone(), e.to_string()))?;

            let io = hyper_util::rt::TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| OrchestratorError::Request(e.to_string()))?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                let _ = conn.await;
            });

            let uri = format!("http://{}{path}", self.authority);
            let req = http::Request::builder()
                .method(method)
                .uri(&uri)
                .header("host", &self.authority)
                .header("content-type", "application/json")
                .header("user-agent", "herdwatch/0.1")
                .body(Full::new(body))
                .map_err(|e| OrchestratorError::Request(e.to_string()))?;

            debug!(%method, %uri, "orchestrator request");
            let resp = sender
                .send_request(req)
                .await
                .map_err(|e| OrchestratorError::Request(e.to_string()))?;

            let status = resp.status().as_u16();
            let bytes = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| OrchestratorError::Request(e.to_string()))?
                .to_bytes();
            Ok((status, bytes))
        };

        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(OrchestratorError::Timeout(timeout)),
        }
    }
}

#[async_trait]
impl Orchestrator for MarathonClient {
    async fn application(&self, name: &str) -> Result<Application, OrchestratorError> {
        let path = format!("/v2/apps/{name}");
        let (status, body) = self.request("GET", &path, Bytes::new()).await?;
        if !(200..300).contains(&status) {
            return Err(OrchestratorError::Status(status));
        }
        let envelope: AppEnvelope = serde_json::from_slice(&body)
            .map_err(|e| OrchestratorError::Decode(e.to_string()))?;
        Ok(envelope.app)
    }

    async fn scale_to(&self, name: &str, instances: u32) -> Result<(), OrchestratorError> {
        let path = format!("/v2/apps/{name}");
        let body = Bytes::from(format!(r#"{{"instances":{instances}}}"#));
        let (status, _) = self.request("PUT", &path, body).await?;
        if !(200..300).contains(&status) {
            return Err(OrchestratorError::Status(status));
        }
        Ok(())
    }
}
