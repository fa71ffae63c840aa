//! Rule-change notification that may start a scaling job.

use serde::{Deserialize, Serialize};
use shardgrid_core::{DataSourceConfigurations, RuleConfiguration};

use crate::error::{ScalingError, ScalingResult};

/// Emitted when the rules of a logical database are altered.
///
/// The four snapshots are JSON text: data sources as an ordered object of
/// unit name → pool properties, rules as an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartScalingEvent {
    pub database_name: String,
    pub source_data_sources: String,
    pub source_rules: String,
    pub target_data_sources: String,
    pub target_rules: String,
    #[serde(default = "default_count")]
    pub shard_total_count: u32,
    #[serde(default = "default_count")]
    pub concurrency: u32,
}

fn default_count() -> u32 {
    1
}

impl StartScalingEvent {
    /// Build a notification by serializing typed configurations.
    pub fn from_configurations(
        database_name: &str,
        source_data_sources: &DataSourceConfigurations,
        source_rules: &[RuleConfiguration],
        target_data_sources: &DataSourceConfigurations,
        target_rules: &[RuleConfiguration],
    ) -> ScalingResult<Self> {
        Ok(Self {
            database_name: database_name.to_string(),
            source_data_sources: to_json(source_data_sources)?,
            source_rules: to_json(source_rules)?,
            target_data_sources: to_json(target_data_sources)?,
            target_rules: to_json(target_rules)?,
            shard_total_count: default_count(),
            concurrency: default_count(),
        })
    }

    /// Builder method: set the shard count and concurrency.
    pub fn with_sharding(self, shard_total_count: u32, concurrency: u32) -> Self {
        Self {
            shard_total_count,
            concurrency,
            ..self
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> ScalingResult<String> {
    serde_json::to_string(value).map_err(|e| ScalingError::Serialize(e.to_string()))
}
