//! ScalingJobBuilder: turns a rule-change notification into a job
//! configuration.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use shardgrid_core::{DataSourceConfigurations, DialectRegistry, RuleConfiguration};
use shardgrid_topology::{ResourceTopology, create_data_sources};
use tracing::debug;

use crate::error::{ScalingError, ScalingResult};
use crate::event::StartScalingEvent;
use crate::job::{ScalingJobConfig, altered_rules};

pub struct ScalingJobBuilder {
    dialects: Arc<DialectRegistry>,
}

impl ScalingJobBuilder {
    pub fn new(dialects: Arc<DialectRegistry>) -> Self {
        Self { dialects }
    }

    /// Build the job configuration for `event`.
    ///
    /// Returns `Ok(None)` when no target rule both enables the rule-altered
    /// action and differs from its source counterpart. Both topology
    /// snapshots must parse; a URL no dialect recognizes fails the build.
    pub fn build(&self, event: &StartScalingEvent) -> ScalingResult<Option<ScalingJobConfig>> {
        let database = event.database_name.as_str();
        let source_rules: Vec<RuleConfiguration> = parse_snapshot("source_rules", &event.source_rules)?;
        let target_rules: Vec<RuleConfiguration> = parse_snapshot("target_rules", &event.target_rules)?;

        let altered = altered_rules(&source_rules, &target_rules);
        if altered.is_empty() {
            debug!(%database, "no altered rule enables scaling, skipping");
            return Ok(None);
        }
        let altered_kinds: Vec<&str> = altered.iter().map(|rule| rule.kind()).collect();

        let source_data_sources: DataSourceConfigurations =
            parse_snapshot("source_data_sources", &event.source_data_sources)?;
        let target_data_sources: DataSourceConfigurations =
            parse_snapshot("target_data_sources", &event.target_data_sources)?;

        let source = self.topology(database, &source_data_sources)?;
        let target = self.topology(database, &target_data_sources)?;
        debug!(
            %database,
            altered = ?altered_kinds,
            source_units = source.storage_units().len(),
            source_instances = source.get_all_instance_data_source_names().len(),
            target_units = target.storage_units().len(),
            target_instances = target.get_all_instance_data_source_names().len(),
            "scaling job snapshot taken"
        );

        let config = ScalingJobConfig::new(
            database,
            source_data_sources,
            source_rules,
            target_data_sources,
            target_rules,
            event.shard_total_count,
            event.concurrency,
        )?;
        Ok(Some(config))
    }

    fn topology(&self, database: &str, configs: &DataSourceConfigurations) -> ScalingResult<ResourceTopology> {
        let handles = create_data_sources(configs);
        Ok(ResourceTopology::new(Some(database), &handles, &self.dialects)?)
    }
}

/// Parse one snapshot field; blank text is an empty snapshot.
fn parse_snapshot<T: DeserializeOwned + Default>(field: &'static str, json: &str) -> ScalingResult<T> {
    if json.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(json).map_err(|e| ScalingError::Snapshot {
        field,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardgrid_core::{DataSourcePoolProperties, DescriptorError, ShardingRuleConfiguration};
    use shardgrid_topology::TopologyError;

    fn builder() -> ScalingJobBuilder {
        ScalingJobBuilder::new(Arc::new(DialectRegistry::with_defaults().unwrap()))
    }

    fn data_sources(urls: &[(&str, &str)]) -> DataSourceConfigurations {
        urls.iter()
            .map(|(name, url)| (name.to_string(), DataSourcePoolProperties::new(*url)))
            .collect()
    }

    fn rule(scaling_name: Option<&str>, algorithm: &str) -> RuleConfiguration {
        RuleConfiguration::Sharding(ShardingRuleConfiguration {
            sharding_algorithms: [(
                "database_inline".to_string(),
                shardgrid_core::AlgorithmConfiguration {
                    kind: algorithm.to_string(),
                    props: Default::default(),
                },
            )]
            .into(),
            scaling_name: scaling_name.map(str::to_string),
            ..Default::default()
        })
    }

    fn event(source_rule: RuleConfiguration, target_rule: RuleConfiguration, target_url: &str) -> StartScalingEvent {
        StartScalingEvent::from_configurations(
            "sharding_db",
            &data_sources(&[("ds_0", "jdbc:mysql://a:3306/ds_0")]),
            &[source_rule],
            &data_sources(&[("ds_0", "jdbc:mysql://a:3306/ds_0"), ("ds_1", target_url)]),
            &[target_rule],
        )
        .unwrap()
    }

    #[test]
    fn builds_config_for_altered_rule() {
        let event = event(
            rule(Some("default_scaling"), "INLINE"),
            rule(Some("default_scaling"), "MOD"),
            "jdbc:mysql://b:3306/ds_1",
        )
        .with_sharding(4, 2);
        let config = builder().build(&event).unwrap().unwrap();

        assert_eq!(config.database_name, "sharding_db");
        assert_eq!(config.source_topology_snapshot.len(), 1);
        assert_eq!(config.target_topology_snapshot.len(), 2);
        assert_eq!((config.shard_total_count, config.concurrency), (4, 2));
        assert_eq!(config.altered_rules().len(), 1);
    }

    #[test]
    fn unchanged_rules_build_nothing() {
        let same = rule(Some("default_scaling"), "INLINE");
        let event = event(same.clone(), same, "jdbc:mysql://b:3306/ds_1");
        assert!(builder().build(&event).unwrap().is_none());
    }

    #[test]
    fn rule_without_scaling_name_builds_nothing() {
        let event = event(rule(None, "INLINE"), rule(None, "MOD"), "jdbc:mysql://b:3306/ds_1");
        assert!(builder().build(&event).unwrap().is_none());
    }

    #[test]
    fn unparsable_target_url_fails() {
        let event = event(
            rule(Some("default_scaling"), "INLINE"),
            rule(Some("default_scaling"), "MOD"),
            "jdbc:mysql://b:3306",
        );
        let err = builder().build(&event).unwrap_err();
        assert!(matches!(
            err,
            ScalingError::Topology(TopologyError::Descriptor(DescriptorError::UnrecognizedUrl { .. }))
        ));
    }

    #[test]
    fn malformed_snapshot_names_the_field() {
        let mut event = event(
            rule(Some("default_scaling"), "INLINE"),
            rule(Some("default_scaling"), "MOD"),
            "jdbc:mysql://b:3306/ds_1",
        );
        event.target_data_sources = "{not json".into();
        let err = builder().build(&event).unwrap_err();
        assert!(matches!(err, ScalingError::Snapshot { field: "target_data_sources", .. }));
    }

    #[test]
    fn blank_source_snapshot_is_empty() {
        let mut event = event(
            rule(Some("default_scaling"), "INLINE"),
            rule(Some("default_scaling"), "MOD"),
            "jdbc:mysql://b:3306/ds_1",
        );
        event.source_rules = String::new();
        event.source_data_sources = " ".into();
        let config = builder().build(&event).unwrap().unwrap();
        assert!(config.source_topology_snapshot.is_empty());
        assert!(config.source_rule_snapshot.is_empty());
    }
}
