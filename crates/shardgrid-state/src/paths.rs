//! Canonical repository paths.
//!
//! ```text
//! /
//! ├── props                                  global properties
//! ├── rules                                  global rules
//! ├── metadata/
//! │   └── {database}/                        database marker
//! │       ├── data_sources                   unit → pool properties, in order
//! │       └── rules                          database rules
//! └── scaling/
//!     └── {database}/
//!         ├── active                         id of the in-flight job
//!         └── jobs/
//!             └── {job_id}                   job descriptor
//! ```

use crate::error::{StateError, StateResult};

pub const PROPS: &str = "/props";
pub const GLOBAL_RULES: &str = "/rules";
pub const METADATA_ROOT: &str = "/metadata";
pub const SCALING_ROOT: &str = "/scaling";

/// Reject names that would escape their path segment.
pub fn check_segment(name: &str) -> StateResult<&str> {
    if name.is_empty() || name.contains('/') {
        return Err(StateError::InvalidPath(format!("invalid path segment `{name}`")));
    }
    Ok(name)
}

pub fn database(database: &str) -> String {
    format!("{METADATA_ROOT}/{database}")
}

pub fn data_sources(database: &str) -> String {
    format!("{METADATA_ROOT}/{database}/data_sources")
}

pub fn database_rules(database: &str) -> String {
    format!("{METADATA_ROOT}/{database}/rules")
}

pub fn scaling_database(database: &str) -> String {
    format!("{SCALING_ROOT}/{database}")
}

pub fn active_job(database: &str) -> String {
    format!("{SCALING_ROOT}/{database}/active")
}

pub fn jobs(database: &str) -> String {
    format!("{SCALING_ROOT}/{database}/jobs")
}

pub fn job(database: &str, job_id: &str) -> String {
    format!("{SCALING_ROOT}/{database}/jobs/{job_id}")
}
