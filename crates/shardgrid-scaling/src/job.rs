//! Scaling job configuration and the persisted job descriptor.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shardgrid_core::{DataSourceConfigurations, RuleConfiguration, ScalingPolicy};

use crate::error::{ScalingError, ScalingResult};
use crate::status::JobStatus;

/// Immutable description of one data migration.
///
/// The snapshots are owned copies; nothing here refers back to a live
/// topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingJobConfig {
    pub job_id: String,
    pub database_name: String,
    pub source_topology_snapshot: DataSourceConfigurations,
    pub source_rule_snapshot: Vec<RuleConfiguration>,
    pub target_topology_snapshot: DataSourceConfigurations,
    pub target_rule_snapshot: Vec<RuleConfiguration>,
    pub shard_total_count: u32,
    pub concurrency: u32,
}

/// Everything the job id is derived from.
#[derive(Serialize)]
struct JobContent<'a> {
    database_name: &'a str,
    source_topology_snapshot: &'a DataSourceConfigurations,
    source_rule_snapshot: &'a [RuleConfiguration],
    target_topology_snapshot: &'a DataSourceConfigurations,
    target_rule_snapshot: &'a [RuleConfiguration],
    shard_total_count: u32,
    concurrency: u32,
}

impl ScalingJobConfig {
    /// Assemble a configuration and derive its job id from the content.
    pub fn new(
        database_name: impl Into<String>,
        source_topology_snapshot: DataSourceConfigurations,
        source_rule_snapshot: Vec<RuleConfiguration>,
        target_topology_snapshot: DataSourceConfigurations,
        target_rule_snapshot: Vec<RuleConfiguration>,
        shard_total_count: u32,
        concurrency: u32,
    ) -> ScalingResult<Self> {
        let database_name = database_name.into();
        let job_id = job_id(&JobContent {
            database_name: &database_name,
            source_topology_snapshot: &source_topology_snapshot,
            source_rule_snapshot: &source_rule_snapshot,
            target_topology_snapshot: &target_topology_snapshot,
            target_rule_snapshot: &target_rule_snapshot,
            shard_total_count,
            concurrency,
        })?;
        Ok(Self {
            job_id,
            database_name,
            source_topology_snapshot,
            source_rule_snapshot,
            target_topology_snapshot,
            target_rule_snapshot,
            shard_total_count,
            concurrency,
        })
    }

    /// Target rules whose alteration moves data.
    pub fn altered_rules(&self) -> Vec<&RuleConfiguration> {
        altered_rules(&self.source_rule_snapshot, &self.target_rule_snapshot)
    }

    /// Scaling policy of the altered rule. A rule naming a policy it does
    /// not declare gets the default policy.
    pub fn altered_rule_policy(&self) -> ScalingResult<ScalingPolicy> {
        let rule = self
            .altered_rules()
            .into_iter()
            .next()
            .ok_or_else(|| ScalingError::NoAlteredRule(self.job_id.clone()))?;
        Ok(rule.scaling_policy().cloned().unwrap_or_default())
    }
}

/// Rules in `target` that enable the rule-altered action and differ from
/// the `source` rule of the same kind.
pub(crate) fn altered_rules<'a>(
    source: &[RuleConfiguration],
    target: &'a [RuleConfiguration],
) -> Vec<&'a RuleConfiguration> {
    target
        .iter()
        .filter(|rule| rule.is_on_rule_altered_action_enabled())
        .filter(|rule| source.iter().find(|s| s.kind() == rule.kind()) != Some(*rule))
        .collect()
}

/// First 32 hex characters of the SHA-256 of the canonical JSON content.
///
/// `serde_json::Value` objects keep their keys sorted, so the digest does
/// not depend on field or map iteration order.
fn job_id(content: &JobContent<'_>) -> ScalingResult<String> {
    let canonical = serde_json::to_value(content).map_err(|e| ScalingError::Serialize(e.to_string()))?;
    let digest = Sha256::digest(canonical.to_string().as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(32);
    Ok(id)
}

/// Job descriptor as persisted: the configuration plus its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingJob {
    #[serde(flatten)]
    pub config: ScalingJobConfig,
    pub status: JobStatus,
}

impl ScalingJob {
    pub fn job_id(&self) -> &str {
        &self.config.job_id
    }

    pub fn database_name(&self) -> &str {
        &self.config.database_name
    }
}
