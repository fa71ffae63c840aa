//! ScalingJobCoordinator: deduplicates, persists and advances scaling
//! jobs.
//!
//! Persisted layout, per logical database:
//!
//! - `/scaling/{database}/active` holds the id of the job currently in
//!   flight.
//! - `/scaling/{database}/jobs/{job_id}` holds the job descriptor, status
//!   included.
//!
//! The claim and the descriptor are written together in one conditional
//! batch: neither exists without the other, and a recorded descriptor is
//! never overwritten. A claim naming a missing or terminal job is stale and
//! gets taken over. Status updates are compare-and-set on the descriptor.
//!
//! Exclusion is by logical database name only.

use std::sync::Arc;

use shardgrid_state::{PersistRepository, paths};
use tracing::{debug, info, warn};

use crate::builder::ScalingJobBuilder;
use crate::error::{ScalingError, ScalingResult};
use crate::event::StartScalingEvent;
use crate::job::ScalingJob;
use crate::status::JobStatus;

/// Claim attempts per creation; each retry follows a stale claim release.
const CLAIM_ATTEMPTS: usize = 3;

pub struct ScalingJobCoordinator {
    repository: Arc<dyn PersistRepository>,
    builder: ScalingJobBuilder,
}

impl ScalingJobCoordinator {
    pub fn new(repository: Arc<dyn PersistRepository>, builder: ScalingJobBuilder) -> Self {
        Self { repository, builder }
    }

    /// Create a scaling job for `event`.
    ///
    /// Returns `Ok(None)` when the event carries no migration directive.
    /// Fails with [`ScalingError::DuplicateJob`] while another job of the
    /// same database is uncompleted, and with [`ScalingError::JobExists`]
    /// when the same job was recorded before. A failed write leaves no job
    /// state behind.
    pub fn create_job(&self, event: &StartScalingEvent) -> ScalingResult<Option<ScalingJob>> {
        let Some(config) = self.builder.build(event)? else {
            return Ok(None);
        };
        let database = paths::check_segment(&config.database_name)?.to_string();

        if self.has_uncompleted_job(&database)? {
            warn!(%database, "scaling job rejected, uncompleted job exists");
            return Err(ScalingError::DuplicateJob { database });
        }

        let job = ScalingJob {
            config,
            status: JobStatus::Preparing,
        };
        let job_id = job.job_id().to_string();
        let active = paths::active_job(&database);
        let path = paths::job(&database, &job_id);
        let json = encode(&job)?;

        for _ in 0..CLAIM_ATTEMPTS {
            let entries = [(active.as_str(), job_id.as_str()), (path.as_str(), json.as_str())];
            if self.repository.create_all_if_absent(&entries)? {
                info!(
                    %database,
                    %job_id,
                    shard_total_count = job.config.shard_total_count,
                    concurrency = job.config.concurrency,
                    "scaling job created"
                );
                return Ok(Some(job));
            }

            if let Some(existing) = self.get_job(&database, &job_id)? {
                warn!(%database, %job_id, status = %existing.status, "scaling job rejected, already recorded");
                return Err(ScalingError::JobExists { database, job_id });
            }
            match self.repository.get(&active)? {
                Some(holder) if self.is_stale_claim(&database, &holder)? => {
                    if self.repository.delete_if_equals(&active, &holder)? {
                        warn!(%database, stale_job_id = %holder, "stale scaling job claim released");
                    }
                }
                Some(_) => {
                    warn!(%database, "scaling job rejected, another job claimed the database");
                    return Err(ScalingError::DuplicateJob { database });
                }
                // Released since the attempt.
                None => {}
            }
        }
        Err(ScalingError::DuplicateJob { database })
    }

    /// Whether any persisted job of `database` is not yet terminal.
    ///
    /// A point-in-time answer; [`create_job`](Self::create_job) does not
    /// rely on it alone.
    pub fn has_uncompleted_job(&self, database: &str) -> ScalingResult<bool> {
        Ok(self
            .list_jobs(database)?
            .iter()
            .any(|job| !job.status.is_terminal()))
    }

    pub fn get_job(&self, database: &str, job_id: &str) -> ScalingResult<Option<ScalingJob>> {
        Ok(self.read_job(database, job_id)?.map(|(_, job)| job))
    }

    /// All persisted jobs of `database`, ordered by job id.
    pub fn list_jobs(&self, database: &str) -> ScalingResult<Vec<ScalingJob>> {
        paths::check_segment(database)?;
        let mut jobs = Vec::new();
        for job_id in self.repository.list_children(&paths::jobs(database))? {
            // Removed between the listing and the read.
            if let Some(job) = self.get_job(database, &job_id)? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    /// Move a job forward to `status`.
    ///
    /// Writing the current status again is a no-op, apart from retrying the
    /// claim release of a terminal job. Reaching a terminal status releases
    /// the database for the next job. A concurrent writer makes this call
    /// re-read and re-check the transition.
    pub fn update_status(&self, database: &str, job_id: &str, status: JobStatus) -> ScalingResult<ScalingJob> {
        loop {
            let (current, mut job) = self.require_job(database, job_id)?;
            if job.status == status {
                debug!(%database, %job_id, %status, "scaling job status unchanged");
                if status.is_terminal() {
                    self.release(database, job_id)?;
                }
                return Ok(job);
            }
            if !job.status.can_transition_to(status) {
                return Err(ScalingError::IllegalTransition {
                    job_id: job_id.to_string(),
                    from: job.status,
                    to: status,
                });
            }

            let from = job.status;
            job.status = status;
            let path = paths::job(database, job_id);
            if !self.repository.put_if_equals(&path, &current, &encode(&job)?)? {
                debug!(%database, %job_id, "scaling job changed concurrently, re-reading");
                continue;
            }
            info!(%database, %job_id, %from, to = %status, "scaling job status changed");

            if status.is_terminal() {
                self.release(database, job_id)?;
            }
            return Ok(job);
        }
    }

    /// Ask the executor to stop a job. Stopping is cooperative: the status
    /// is written and the executor observes it.
    pub fn stop_job(&self, database: &str, job_id: &str) -> ScalingResult<ScalingJob> {
        self.update_status(database, job_id, JobStatus::Stopped)
    }

    /// Delete a terminal job's descriptor.
    pub fn remove_job(&self, database: &str, job_id: &str) -> ScalingResult<()> {
        let (_, job) = self.require_job(database, job_id)?;
        if !job.status.is_terminal() {
            return Err(ScalingError::JobNotTerminal {
                job_id: job_id.to_string(),
                status: job.status,
            });
        }
        self.release(database, job_id)?;
        self.repository.delete(&paths::job(database, job_id))?;
        info!(%database, %job_id, "scaling job removed");
        Ok(())
    }

    /// The stored descriptor text together with the decoded job.
    fn read_job(&self, database: &str, job_id: &str) -> ScalingResult<Option<(String, ScalingJob)>> {
        paths::check_segment(database)?;
        paths::check_segment(job_id)?;
        let path = paths::job(database, job_id);
        let Some(json) = self.repository.get(&path)? else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(job) => Ok(Some((json, job))),
            Err(e) => Err(ScalingError::CorruptJob {
                path,
                reason: e.to_string(),
            }),
        }
    }

    fn require_job(&self, database: &str, job_id: &str) -> ScalingResult<(String, ScalingJob)> {
        self.read_job(database, job_id)?
            .ok_or_else(|| ScalingError::JobNotFound {
                database: database.to_string(),
                job_id: job_id.to_string(),
            })
    }

    /// A claim is stale when the job it names is gone or finished.
    fn is_stale_claim(&self, database: &str, holder: &str) -> ScalingResult<bool> {
        if paths::check_segment(holder).is_err() {
            return Ok(true);
        }
        Ok(self
            .get_job(database, holder)?
            .is_none_or(|job| job.status.is_terminal()))
    }

    /// Drop the active claim if `job_id` holds it.
    fn release(&self, database: &str, job_id: &str) -> ScalingResult<()> {
        if self
            .repository
            .delete_if_equals(&paths::active_job(database), job_id)?
        {
            debug!(%database, %job_id, "scaling job claim released");
        }
        Ok(())
    }
}

fn encode(job: &ScalingJob) -> ScalingResult<String> {
    serde_json::to_string(job).map_err(|e| ScalingError::Serialize(e.to_string()))
}
