//! Cluster snapshot aggregation.
//!
//! One orchestrator query, then a concurrent fan-out of metric fetches,
//! rejoined in task-list order. Individual fetch failures silently exclude
//! that instance: a snapshot missing a few instances beats blocking the
//! whole tick on one unresponsive task.

use std::sync::Arc;

use tracing::{debug, warn};

use herdwatch_marathon::Orchestrator;
use herdwatch_model::{ClusterSnapshot, Instance, LoadTotals};

use crate::fetcher::MetricSource;

/// Builds one fresh `ClusterSnapshot` per call.
pub struct SnapshotAggregator {
    orchestrator: Arc<dyn Orchestrator>,
    metrics: Arc<dyn MetricSource>,
    app: String,
}

impl SnapshotAggregator {
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        metrics: Arc<dyn MetricSource>,
        app: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator,
            metrics,
            app: app.into(),
        }
    }

    /// The application this aggregator watches.
    pub fn app(&self) -> &str {
        &self.app
    }

    /// Build the current cluster snapshot and its load totals.
    ///
    /// Never fails. An orchestrator query failure degrades to an empty
    /// snapshot with a zero instance count; per-task fetch failures exclude
    /// only that instance while `instance_count` keeps the orchestrator's
    /// reported count.
    pub async fn build_snapshot(&self) -> (ClusterSnapshot, LoadTotals) {
        let app = match self.orchestrator.application(&self.app).await {
            Ok(app) => app,
            Err(e) => {
                warn!(app = %self.app, error = %e, "orchestrator query failed, snapshot degrades to empty");
                return (ClusterSnapshot::default(), LoadTotals::default());
            }
        };

        // Fan out one fetch per task. Sibling fetches run concurrently but
        // results rejoin in task-list order so the display stays stable.
        let fetches: Vec<_> = app
            .tasks
            .into_iter()
            .map(|task| {
                let source = Arc::clone(&self.metrics);
                tokio::spawn(async move {
                    let Some(port) = task.ports.first().copied() else {
                        debug!(task = %task.id, "task reports no ports, excluding");
                        return None;
                    };
                    match source.fetch(&task.host, port).await {
                        Ok(metrics) => Some((task.id, metrics)),
                        Err(e) => {
                            debug!(task = %task.id, error = %e, "metrics fetch failed, excluding");
                            None
                        }
                    }
                })
            })
            .collect();

        let mut snapshot = ClusterSnapshot {
            instances: Vec::with_capacity(fetches.len()),
            instance_count: app.instances,
        };
        let mut totals = LoadTotals::default();

        for handle in fetches {
            let Ok(Some((id, metrics))) = handle.await else {
                continue;
            };
            totals.add(&metrics);
            snapshot.instances.push(Instance {
                id,
                capacity: metrics.max,
                load: metrics.ops,
            });
        }

        (snapshot, totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;

    use herdwatch_marathon::{AppTask, Application, OrchestratorError};
    use herdwatch_model::TaskMetrics;

    use crate::error::FetchError;

    struct MockOrchestrator {
        app: Option<Application>,
    }

    #[async_trait]
    impl Orchestrator for MockOrchestrator {
        async fn application(&self, _name: &str) -> Result<Application, OrchestratorError> {
            self.app.clone().ok_or(OrchestratorError::Status(503))
        }

        async fn scale_to(&self, _name: &str, _instances: u32) -> Result<(), OrchestratorError> {
            Ok(())
        }
    }

    /// Per-port canned responses, with an optional per-port delay to shake
    /// up completion order.
    struct MockSource {
        responses: HashMap<u16, TaskMetrics>,
        delays: HashMap<u16, Duration>,
    }

    #[async_trait]
    impl MetricSource for MockSource {
        async fn fetch(&self, _host: &str, port: u16) -> Result<TaskMetrics, FetchError> {
            if let Some(delay) = self.delays.get(&port) {
                tokio::time::sleep(*delay).await;
            }
            self.responses
                .get(&port)
                .copied()
                .ok_or(FetchError::Status(500))
        }
    }

    fn task(id: &str, port: u16) -> AppTask {
        AppTask {
            id: id.to_string(),
            host: "10.0.0.4".to_string(),
            ports: vec![port],
        }
    }

    fn application(tasks: Vec<AppTask>) -> Application {
        Application {
            id: "/cattlestore".to_string(),
            instances: tasks.len() as u32,
            tasks,
        }
    }

    fn aggregator(app: Option<Application>, source: MockSource) -> SnapshotAggregator {
        SnapshotAggregator::new(
            Arc::new(MockOrchestrator { app }),
            Arc::new(source),
            "cattlestore",
        )
    }

    #[tokio::test]
    async fn orchestrator_failure_degrades_to_empty() {
        let agg = aggregator(
            None,
            MockSource {
                responses: HashMap::new(),
                delays: HashMap::new(),
            },
        );

        let (snapshot, totals) = agg.build_snapshot().await;
        assert_eq!(snapshot, ClusterSnapshot::default());
        assert_eq!(totals, LoadTotals::default());
    }

    #[tokio::test]
    async fn successful_fetches_build_instances_and_totals() {
        let app = application(vec![task("t-1", 31001), task("t-2", 31002)]);
        let agg = aggregator(
            Some(app),
            MockSource {
                responses: HashMap::from([
                    (31001, TaskMetrics { max: 24, ops: 18 }),
                    (31002, TaskMetrics { max: 13, ops: 3 }),
                ]),
                delays: HashMap::new(),
            },
        );

        let (snapshot, totals) = agg.build_snapshot().await;
        assert_eq!(snapshot.instance_count, 2);
        assert_eq!(snapshot.instances.len(), 2);
        assert_eq!(snapshot.instances[0].id, "t-1");
        assert_eq!(snapshot.instances[0].capacity, 24);
        assert_eq!(totals.load, 21);
        assert_eq!(totals.capacity, 37);
    }

    #[tokio::test]
    async fn failed_fetch_excludes_only_that_instance() {
        let app = application(vec![task("t-1", 31001), task("t-2", 31002)]);
        let agg = aggregator(
            Some(app),
            MockSource {
                responses: HashMap::from([(31002, TaskMetrics { max: 13, ops: 3 })]),
                delays: HashMap::new(),
            },
        );

        let (snapshot, totals) = agg.build_snapshot().await;
        // Reported count is unchanged, only the failed fetch is missing.
        assert_eq!(snapshot.instance_count, 2);
        assert_eq!(snapshot.instances.len(), 1);
        assert_eq!(snapshot.instances[0].id, "t-2");
        assert_eq!(totals.capacity, 13);
    }

    #[tokio::test]
    async fn all_fetches_failing_keeps_reported_count() {
        let app = application(vec![task("t-1", 31001), task("t-2", 31002), task("t-3", 31003)]);
        let agg = aggregator(
            Some(app),
            MockSource {
                responses: HashMap::new(),
                delays: HashMap::new(),
            },
        );

        let (snapshot, totals) = agg.build_snapshot().await;
        assert!(snapshot.instances.is_empty());
        assert_eq!(snapshot.instance_count, 3);
        assert_eq!(totals, LoadTotals::default());
    }

    #[tokio::test]
    async fn task_without_ports_is_excluded() {
        let mut no_ports = task("t-1", 0);
        no_ports.ports.clear();
        let app = application(vec![no_ports, task("t-2", 31002)]);
        let agg = aggregator(
            Some(app),
            MockSource {
                responses: HashMap::from([(31002, TaskMetrics { max: 10, ops: 1 })]),
                delays: HashMap::new(),
            },
        );

        let (snapshot, _) = agg.build_snapshot().await;
        assert_eq!(snapshot.instance_count, 2);
        assert_eq!(snapshot.instances.len(), 1);
        assert_eq!(snapshot.instances[0].id, "t-2");
    }

    #[tokio::test(start_paused = true)]
    async fn instances_keep_task_list_order_despite_completion_order() {
        let app = application(vec![task("t-1", 31001), task("t-2", 31002)]);
        // The first task answers much slower than the second.
        let agg = aggregator(
            Some(app),
            MockSource {
                responses: HashMap::from([
                    (31001, TaskMetrics { max: 24, ops: 18 }),
                    (31002, TaskMetrics { max: 13, ops: 3 }),
                ]),
                delays: HashMap::from([
                    (31001, Duration::from_millis(500)),
                    (31002, Duration::from_millis(5)),
                ]),
            },
        );

        let (snapshot, _) = agg.build_snapshot().await;
        let ids: Vec<_> = snapshot.instances.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["t-1", "t-2"]);
    }

    #[tokio::test]
    async fn build_snapshot_is_idempotent_against_stable_upstream() {
        let app = application(vec![task("t-1", 31001)]);
        let agg = aggregator(
            Some(app),
            MockSource {
                responses: HashMap::from([(31001, TaskMetrics { max: 24, ops: 18 })]),
                delays: HashMap::new(),
            },
        );

        let (first, _) = agg.build_snapshot().await;
        let (second, _) = agg.build_snapshot().await;
        assert_eq!(first, second);
    }
}
