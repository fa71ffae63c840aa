//! shardgrid-scaling: online resharding job coordination.
//!
//! Reacts to rule-change notifications by snapshotting the old and new
//! topology and rules of a logical database into a [`ScalingJobConfig`],
//! and persists it as a job descriptor unless another job of the same
//! database is still in flight. The data-copy executor that consumes the
//! descriptor lives elsewhere and advances the job status through the
//! same store.
//!
//! # Components
//!
//! - **`status`**: [`JobStatus`] lifecycle (forward-only)
//! - **`event`**: [`StartScalingEvent`], the inbound notification
//! - **`job`**: [`ScalingJobConfig`] (content-derived id) and the persisted [`ScalingJob`]
//! - **`builder`**: [`ScalingJobBuilder`], notification → configuration
//! - **`coordinator`**: [`ScalingJobCoordinator`], dedup, persistence, status
//! - **`worker`**: [`ScalingWorker`], queue consumer
//!
//! ```text
//! mpsc<StartScalingEvent> ──► ScalingWorker ──► ScalingJobCoordinator
//!                                                  ├── ScalingJobBuilder
//!                                                  └── PersistRepository
//!                                                       ├── /scaling/{db}/active
//!                                                       └── /scaling/{db}/jobs/{id}
//! ```

pub mod builder;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod job;
pub mod status;
pub mod worker;

pub use builder::ScalingJobBuilder;
pub use coordinator::ScalingJobCoordinator;
pub use error::{ScalingError, ScalingResult};
pub use event::StartScalingEvent;
pub use job::{ScalingJob, ScalingJobConfig};
pub use status::JobStatus;
pub use worker::{ScalingWorker, WorkerReport};
