//! The scale controller and its cooldown state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use herdwatch_marathon::Orchestrator;
use herdwatch_model::LoadTotals;

/// When and how far to scale up.
#[derive(Debug, Clone)]
pub struct ScalePolicy {
    /// Load/capacity ratio above which the cluster counts as loaded.
    /// Strict comparison: a ratio of exactly this value does not trigger.
    pub load_ratio: f64,
    /// Trigger only when remaining capacity drops below this.
    pub min_headroom: u64,
    /// Minimum time between two scale-up attempts.
    pub cooldown: Duration,
    /// Instances added per scale-up.
    pub step: u32,
}

impl Default for ScalePolicy {
    fn default() -> Self {
        Self {
            load_ratio: 0.5,
            min_headroom: 120,
            cooldown: Duration::from_secs(5),
            step: 2,
        }
    }
}

/// Issues at most one scale-up per cooldown window.
///
/// The cooldown check-then-set is a single critical section, so concurrent
/// invocations cannot both pass the gate.
pub struct ScaleController {
    orchestrator: Arc<dyn Orchestrator>,
    app: String,
    policy: ScalePolicy,
    /// Time of the last scale-up attempt. `None` until the first one.
    last_scale: Mutex<Option<Instant>>,
}

impl ScaleController {
    pub fn new(orchestrator: Arc<dyn Orchestrator>, app: impl Into<String>) -> Self {
        Self::with_policy(orchestrator, app, ScalePolicy::default())
    }

    pub fn with_policy(
        orchestrator: Arc<dyn Orchestrator>,
        app: impl Into<String>,
        policy: ScalePolicy,
    ) -> Self {
        Self {
            orchestrator,
            app: app.into(),
            policy,
            last_scale: Mutex::new(None),
        }
    }

    /// Evaluate one tick's totals and possibly issue a scale-up.
    ///
    /// Returns whether a scale request was sent to the orchestrator. A
    /// trigger that passes the cooldown gate consumes the window even when
    /// the follow-up orchestrator calls fail.
    pub async fn maybe_scale_up(&self, totals: LoadTotals, now: Instant) -> bool {
        let Some(ratio) = totals.ratio() else {
            // Zero capacity: the ratio is undefined, take no action.
            return false;
        };
        let headroom = totals.headroom();
        debug!(
            ratio,
            headroom,
            capacity = totals.capacity,
            "scale check"
        );

        if !(ratio > self.policy.load_ratio && headroom < self.policy.min_headroom) {
            return false;
        }

        {
            // Critical section: check the window and claim it in one go,
            // before any orchestrator call, so a slow request cannot let a
            // second trigger through.
            let mut last_scale = self.last_scale.lock().await;
            if let Some(last) = *last_scale {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < self.policy.cooldown {
                    info!(?elapsed, "not scaling, cooldown window active");
                    return false;
                }
            }
            *last_scale = Some(now);
        }

        let current = match self.orchestrator.application(&self.app).await {
            Ok(app) => app.instances,
            Err(e) => {
                warn!(app = %self.app, error = %e, "not scaling, instance count unavailable");
                return false;
            }
        };

        let target = current + self.policy.step;
        info!(app = %self.app, from = current, to = target, "scaling up");
        if let Err(e) = self.orchestrator.scale_to(&self.app, target).await {
            // No rollback of the window; the next eligible tick retries.
            warn!(app = %self.app, target, error = %e, "scale request failed");
        }
        true
    }

    /// Drain the totals channel until shutdown signal.
    pub async fn run(
        &self,
        mut totals: mpsc::Receiver<LoadTotals>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            app = %self.app,
            cooldown_ms = self.policy.cooldown.as_millis() as u64,
            "scale controller started"
        );

        loop {
            tokio::select! {
                received = totals.recv() => match received {
                    Some(totals) => {
                        self.maybe_scale_up(totals, Instant::now()).await;
                    }
                    None => break,
                },
                _ = shutdown.changed() => {
                    info!("scale controller shutting down");
                    break;
                }
            }
        }
    }
}
