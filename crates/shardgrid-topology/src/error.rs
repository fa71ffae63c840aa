//! Topology error types.

use shardgrid_core::DescriptorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("storage unit `{unit}` references unknown storage node `{node}`")]
    MissingStorageNode { unit: String, node: String },

    #[error("no pool properties for storage unit `{0}`")]
    MissingPoolProperties(String),

    #[error("storage unit not found: {0}")]
    StorageUnitNotFound(String),

    #[error("storage unit already exists: {0}")]
    DuplicateStorageUnit(String),

    #[error("database not found: {0}")]
    DatabaseNotFound(String),
}

pub type TopologyResult<T> = Result<T, TopologyError>;
