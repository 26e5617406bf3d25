//! herdwatch-marathon — the orchestrator collaborator.
//!
//! Defines the [`Orchestrator`] trait the rest of herdwatch programs
//! against, plus [`MarathonClient`], an HTTP implementation speaking the
//! Marathon `/v2/apps` API. The client is shared across every connection
//! session and background task, so it must be cheap to clone behind an
//! `Arc` and safe to use concurrently.
//!
//! Retries are deliberately absent: callers poll on a fixed cadence, so the
//! next tick is the retry.

pub mod client;
pub mod error;

use async_trait::async_trait;
use serde::Deserialize;

pub use client::MarathonClient;
pub use error::OrchestratorError;

/// A named application as the orchestrator reports it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Application {
    pub id: String,
    /// Configured instance count. May exceed the number of tasks currently
    /// reported while a deployment is in flight.
    pub instances: u32,
    #[serde(default)]
    pub tasks: Vec<AppTask>,
}

/// One running task of an application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppTask {
    pub id: String,
    #[serde(default)]
    pub host: String,
    /// Host ports in the order the orchestrator assigned them. The first
    /// one fronts the task's status endpoint.
    #[serde(default)]
    pub ports: Vec<u16>,
}

/// Capabilities herdwatch needs from a cluster orchestrator.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Current state of the named application: configured instance count
    /// and the running task list.
    async fn application(&self, name: &str) -> Result<Application, OrchestratorError>;

    /// Request that the application run `instances` instances.
    async fn scale_to(&self, name: &str, instances: u32) -> Result<(), OrchestratorError>;
}
