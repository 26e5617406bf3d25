//! The shared poll loop.
//!
//! One `Poller` serves every connected viewer: each tick builds a single
//! fresh snapshot, publishes it on a broadcast channel for the sessions to
//! serialize, and hands the load totals to the scale controller over a
//! bounded side channel. The previous snapshot is dropped wholesale each
//! tick; nothing accumulates.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use herdwatch_model::{ClusterSnapshot, LoadTotals};

use crate::aggregator::SnapshotAggregator;

/// Period between snapshot builds.
pub const DATA_PUSH_PERIOD: Duration = Duration::from_secs(1);

/// Periodically builds snapshots and fans them out.
pub struct Poller {
    aggregator: SnapshotAggregator,
    interval: Duration,
    snapshots: broadcast::Sender<ClusterSnapshot>,
    totals: mpsc::Sender<LoadTotals>,
}

impl Poller {
    pub fn new(
        aggregator: SnapshotAggregator,
        interval: Duration,
        snapshots: broadcast::Sender<ClusterSnapshot>,
        totals: mpsc::Sender<LoadTotals>,
    ) -> Self {
        Self {
            aggregator,
            interval,
            snapshots,
            totals,
        }
    }

    /// Run the poll loop until shutdown signal.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            app = %self.aggregator.app(),
            interval_ms = self.interval.as_millis() as u64,
            "poller started"
        );

        let mut tick = tokio::time::interval(self.interval);
        // A slow tick (orchestrator at its timeout) must not cause a burst.
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let (snapshot, totals) = self.aggregator.build_snapshot().await;

                    // Fire and forget toward the scale controller. If its
                    // queue is full the controller is mid-request; this
                    // tick's totals are stale by the time it would read
                    // them anyway.
                    if let Err(e) = self.totals.try_send(totals) {
                        debug!(error = %e, "scale controller busy, dropping totals");
                    }

                    // No subscribers is fine; viewers come and go.
                    let _ = self.snapshots.send(snapshot);
                }
                _ = shutdown.changed() => {
                    info!("poller shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use herdwatch_marathon::{AppTask, Application, Orchestrator, OrchestratorError};
    use herdwatch_model::TaskMetrics;

    use crate::error::FetchError;
    use crate::fetcher::MetricSource;

    struct FixedOrchestrator;

    #[async_trait]
    impl Orchestrator for FixedOrchestrator {
        async fn application(&self, _name: &str) -> Result<Application, OrchestratorError> {
            Ok(Application {
                id: "/cattlestore".to_string(),
                instances: 1,
                tasks: vec![AppTask {
                    id: "t-1".to_string(),
                    host: "10.0.0.4".to_string(),
                    ports: vec![31001],
                }],
            })
        }

        async fn scale_to(&self, _name: &str, _instances: u32) -> Result<(), OrchestratorError> {
            Ok(())
        }
    }

    struct FixedSource;

    #[async_trait]
    impl MetricSource for FixedSource {
        async fn fetch(&self, _host: &str, _port: u16) -> Result<TaskMetrics, FetchError> {
            Ok(TaskMetrics { max: 24, ops: 18 })
        }
    }

    fn poller(
        interval: Duration,
    ) -> (
        Poller,
        broadcast::Receiver<ClusterSnapshot>,
        mpsc::Receiver<LoadTotals>,
    ) {
        let aggregator = SnapshotAggregator::new(
            Arc::new(FixedOrchestrator),
            Arc::new(FixedSource),
            "cattlestore",
        );
        let (snap_tx, snap_rx) = broadcast::channel(4);
        let (totals_tx, totals_rx) = mpsc::channel(4);
        (
            Poller::new(aggregator, interval, snap_tx, totals_tx),
            snap_rx,
            totals_rx,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_snapshot_and_totals_each_tick() {
        let (poller, mut snap_rx, mut totals_rx) = poller(Duration::from_secs(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(poller.run(shutdown_rx));

        let snapshot = snap_rx.recv().await.unwrap();
        assert_eq!(snapshot.instance_count, 1);
        assert_eq!(snapshot.instances[0].load, 18);

        let totals = totals_rx.recv().await.unwrap();
        assert_eq!(totals.capacity, 24);
        assert_eq!(totals.load, 18);

        // A second tick publishes again.
        let second = snap_rx.recv().await.unwrap();
        assert_eq!(second, snapshot);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn full_totals_queue_does_not_block_publishing() {
        let (poller, mut snap_rx, _totals_rx) = poller(Duration::from_secs(1));
        // Keep _totals_rx alive but never drain it; the channel fills up.
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(poller.run(shutdown_rx));

        // Snapshots keep flowing well past the totals queue depth.
        for _ in 0..8 {
            snap_rx.recv().await.unwrap();
        }

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_loop() {
        let (poller, _snap_rx, _totals_rx) = poller(Duration::from_secs(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(poller.run(shutdown_rx));

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
