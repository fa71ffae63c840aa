//! Scaling error types.

use thiserror::Error;

use crate::status::JobStatus;

#[derive(Debug, Error)]
pub enum ScalingError {
    #[error("an uncompleted scaling job already exists for database `{database}`")]
    DuplicateJob { database: String },

    #[error("scaling job {database}/{job_id} already exists")]
    JobExists { database: String, job_id: String },

    #[error("scaling job not found: {database}/{job_id}")]
    JobNotFound { database: String, job_id: String },

    #[error("scaling job {job_id} cannot move from {from} to {to}")]
    IllegalTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("scaling job {job_id} is still {status}")]
    JobNotTerminal { job_id: String, status: JobStatus },

    #[error("scaling job {0} has no altered rule")]
    NoAlteredRule(String),

    #[error("invalid {field} snapshot: {reason}")]
    Snapshot { field: &'static str, reason: String },

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("corrupt scaling job at {path}: {reason}")]
    CorruptJob { path: String, reason: String },

    #[error("state store error: {0}")]
    State(#[from] shardgrid_state::StateError),

    #[error("topology error: {0}")]
    Topology(#[from] shardgrid_topology::TopologyError),
}

pub type ScalingResult<T> = Result<T, ScalingError>;
