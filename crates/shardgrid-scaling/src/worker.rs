//! ScalingWorker: background consumer of rule-change notifications.
//!
//! Notifications arrive on an mpsc queue (at-least-once); the coordinator
//! deduplicates by database name and job id, so a redelivered notification
//! is rejected as a duplicate instead of creating a second job. Creation
//! runs on the blocking pool.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::coordinator::ScalingJobCoordinator;
use crate::error::ScalingError;
use crate::event::StartScalingEvent;

/// Outcome counts of one worker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub created: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub failed: usize,
}

pub struct ScalingWorker {
    coordinator: Arc<ScalingJobCoordinator>,
    queue: mpsc::Receiver<StartScalingEvent>,
    shutdown: watch::Receiver<bool>,
}

impl ScalingWorker {
    pub fn new(
        coordinator: Arc<ScalingJobCoordinator>,
        queue: mpsc::Receiver<StartScalingEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            coordinator,
            queue,
            shutdown,
        }
    }

    /// Run on a background task.
    pub fn spawn(self) -> JoinHandle<WorkerReport> {
        tokio::spawn(self.run())
    }

    /// Drain the queue until every sender is gone or shutdown is signalled.
    pub async fn run(self) -> WorkerReport {
        let Self {
            coordinator,
            mut queue,
            mut shutdown,
        } = self;
        let mut report = WorkerReport::default();
        debug!("scaling worker starting");

        loop {
            tokio::select! {
                event = queue.recv() => {
                    match event {
                        Some(event) => handle(&coordinator, event, &mut report).await,
                        None => {
                            debug!("scaling queue closed");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    debug!("scaling worker shutting down");
                    break;
                }
            }
        }

        info!(
            created = report.created,
            skipped = report.skipped,
            duplicates = report.duplicates,
            failed = report.failed,
            "scaling worker stopped"
        );
        report
    }
}

/// Run one creation on the blocking pool; the gateway may block on I/O.
async fn handle(coordinator: &Arc<ScalingJobCoordinator>, event: StartScalingEvent, report: &mut WorkerReport) {
    let database = event.database_name.clone();
    let coordinator = Arc::clone(coordinator);
    let outcome = tokio::task::spawn_blocking(move || coordinator.create_job(&event)).await;
    match outcome {
        Ok(Ok(Some(job))) => {
            debug!(%database, job_id = %job.job_id(), "notification produced a job");
            report.created += 1;
        }
        Ok(Ok(None)) => report.skipped += 1,
        Ok(Err(ScalingError::DuplicateJob { .. } | ScalingError::JobExists { .. })) => {
            warn!(%database, "notification dropped, scaling job already recorded");
            report.duplicates += 1;
        }
        Ok(Err(e)) => {
            error!(%database, error = %e, "failed to create scaling job");
            report.failed += 1;
        }
        Err(e) => {
            error!(%database, error = %e, "scaling job creation task failed");
            report.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardgrid_core::{
        DataSourceConfigurations, DataSourcePoolProperties, DialectRegistry, RuleConfiguration,
        ShardingRuleConfiguration,
    };
    use shardgrid_state::StateStore;

    use crate::builder::ScalingJobBuilder;
    use crate::status::JobStatus;

    fn coordinator() -> Arc<ScalingJobCoordinator> {
        let store = StateStore::open_in_memory().unwrap();
        let builder = ScalingJobBuilder::new(Arc::new(DialectRegistry::with_defaults().unwrap()));
        Arc::new(ScalingJobCoordinator::new(Arc::new(store), builder))
    }

    fn event(database: &str, scaling_name: Option<&str>) -> StartScalingEvent {
        let source: DataSourceConfigurations =
            [("ds_0".to_string(), DataSourcePoolProperties::new("jdbc:mysql://a:3306/ds_0"))].into_iter().collect();
        let mut target = source.clone();
        target.insert("ds_1".to_string(), DataSourcePoolProperties::new("jdbc:mysql://b:3306/ds_1"));
        let rule = RuleConfiguration::Sharding(ShardingRuleConfiguration {
            scaling_name: scaling_name.map(str::to_string),
            ..Default::default()
        });
        StartScalingEvent::from_configurations(database, &source, &[], &target, &[rule]).unwrap()
    }

    #[tokio::test]
    async fn drains_queue_until_closed() {
        let coordinator = coordinator();
        let (tx, rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = ScalingWorker::new(Arc::clone(&coordinator), rx, shutdown_rx).spawn();

        tx.send(event("sharding_db", Some("default_scaling"))).await.unwrap();
        // Redelivery of the same notification.
        tx.send(event("sharding_db", Some("default_scaling"))).await.unwrap();
        tx.send(event("other_db", None)).await.unwrap();
        drop(tx);

        let report = worker.await.unwrap();
        assert_eq!(
            report,
            WorkerReport {
                created: 1,
                skipped: 1,
                duplicates: 1,
                failed: 0,
            }
        );
        assert_eq!(coordinator.list_jobs("sharding_db").unwrap().len(), 1);
        assert!(coordinator.list_jobs("other_db").unwrap().is_empty());
    }

    #[tokio::test]
    async fn redelivery_after_completion_is_a_duplicate() {
        let coordinator = coordinator();
        let job = coordinator
            .create_job(&event("sharding_db", Some("default_scaling")))
            .unwrap()
            .unwrap();
        coordinator
            .update_status("sharding_db", job.job_id(), JobStatus::Running)
            .unwrap();
        coordinator
            .update_status("sharding_db", job.job_id(), JobStatus::Succeeded)
            .unwrap();

        let (tx, rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = ScalingWorker::new(Arc::clone(&coordinator), rx, shutdown_rx).spawn();
        tx.send(event("sharding_db", Some("default_scaling"))).await.unwrap();
        drop(tx);

        assert_eq!(worker.await.unwrap().duplicates, 1);
        let stored = coordinator.get_job("sharding_db", job.job_id()).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn stops_on_shutdown_signal() {
        let (_tx, rx) = mpsc::channel::<StartScalingEvent>(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = ScalingWorker::new(coordinator(), rx, shutdown_rx).spawn();

        shutdown_tx.send(true).unwrap();
        let report = worker.await.unwrap();
        assert_eq!(report, WorkerReport::default());
    }
}
