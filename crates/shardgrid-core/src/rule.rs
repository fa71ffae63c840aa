//! Rule configurations attached to a logical database or to the whole
//! deployment.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ── Database rules ────────────────────────────────────────────────

/// A rule configured on one logical database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleConfiguration {
    Sharding(ShardingRuleConfiguration),
    ReadwriteSplitting(ReadwriteSplittingRuleConfiguration),
}

impl RuleConfiguration {
    pub fn kind(&self) -> &'static str {
        match self {
            RuleConfiguration::Sharding(_) => "sharding",
            RuleConfiguration::ReadwriteSplitting(_) => "readwrite_splitting",
        }
    }

    /// Name of the scaling policy applied when this rule is altered.
    pub fn scaling_name(&self) -> Option<&str> {
        match self {
            RuleConfiguration::Sharding(cfg) => cfg.scaling_name.as_deref().filter(|n| !n.is_empty()),
            RuleConfiguration::ReadwriteSplitting(_) => None,
        }
    }

    /// Whether altering this rule triggers data migration.
    pub fn is_on_rule_altered_action_enabled(&self) -> bool {
        self.scaling_name().is_some()
    }

    /// The named scaling policy, if declared on this rule.
    pub fn scaling_policy(&self) -> Option<&ScalingPolicy> {
        let name = self.scaling_name()?;
        match self {
            RuleConfiguration::Sharding(cfg) => cfg.scaling.get(name),
            RuleConfiguration::ReadwriteSplitting(_) => None,
        }
    }
}

/// Sharding rule: how logic tables map onto actual data nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardingRuleConfiguration {
    #[serde(default)]
    pub tables: Vec<ShardingTableRuleConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_database_strategy: Option<ShardingStrategyConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_table_strategy: Option<ShardingStrategyConfiguration>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sharding_algorithms: BTreeMap<String, AlgorithmConfiguration>,
    /// Scaling policy used when this rule is altered. Absent means an
    /// alteration never moves data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling_name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scaling: BTreeMap<String, ScalingPolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardingTableRuleConfiguration {
    pub logic_table: String,
    /// Inline expression, e.g. `ds_${0..1}.t_order_${0..3}`.
    pub actual_data_nodes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_strategy: Option<ShardingStrategyConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_strategy: Option<ShardingStrategyConfiguration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardingStrategyConfiguration {
    pub sharding_column: String,
    pub algorithm_name: String,
}

/// A pluggable algorithm reference: SPI type plus properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmConfiguration {
    pub kind: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, String>,
}

/// Migration tuning applied by the executor when a rule alteration moves
/// data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    #[serde(default = "default_worker_thread")]
    pub read_worker_thread: u32,
    #[serde(default = "default_batch_size")]
    pub read_batch_size: u32,
    #[serde(default = "default_worker_thread")]
    pub write_worker_thread: u32,
    #[serde(default = "default_batch_size")]
    pub write_batch_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limiter: Option<AlgorithmConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_detector: Option<AlgorithmConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_consistency_checker: Option<AlgorithmConfiguration>,
}

fn default_worker_thread() -> u32 {
    40
}

fn default_batch_size() -> u32 {
    1000
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            read_worker_thread: default_worker_thread(),
            read_batch_size: default_batch_size(),
            write_worker_thread: default_worker_thread(),
            write_batch_size: default_batch_size(),
            rate_limiter: None,
            completion_detector: None,
            data_consistency_checker: None,
        }
    }
}

/// Read/write splitting rule: one writer, several readers per group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadwriteSplittingRuleConfiguration {
    #[serde(default)]
    pub data_sources: Vec<ReadwriteSplittingGroup>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub load_balancers: BTreeMap<String, AlgorithmConfiguration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadwriteSplittingGroup {
    pub name: String,
    pub write_data_source_name: String,
    #[serde(default)]
    pub read_data_source_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer_name: Option<String>,
}

// ── Global rules ──────────────────────────────────────────────────

/// A rule that applies to every logical database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GlobalRuleConfiguration {
    SqlTranslator(SqlTranslatorRuleConfiguration),
    Transaction(TransactionRuleConfiguration),
}

impl GlobalRuleConfiguration {
    pub fn kind(&self) -> &'static str {
        match self {
            GlobalRuleConfiguration::SqlTranslator(_) => "sql_translator",
            GlobalRuleConfiguration::Transaction(_) => "transaction",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlTranslatorRuleConfiguration {
    pub provider: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, String>,
    #[serde(default)]
    pub use_original_sql_when_translating_failed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRuleConfiguration {
    /// `LOCAL`, `XA` or `BASE`.
    pub default_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<String>,
}

impl Default for TransactionRuleConfiguration {
    fn default() -> Self {
        Self {
            default_type: "LOCAL".to_string(),
            provider_type: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sharding(scaling_name: Option<&str>) -> RuleConfiguration {
        RuleConfiguration::Sharding(ShardingRuleConfiguration {
            scaling_name: scaling_name.map(str::to_string),
            ..Default::default()
        })
    }

    #[test]
    fn scaling_name_enables_altered_action() {
        assert!(sharding(Some("default_scaling")).is_on_rule_altered_action_enabled());
        assert!(!sharding(None).is_on_rule_altered_action_enabled());
        assert!(!sharding(Some("")).is_on_rule_altered_action_enabled());
        assert!(
            !RuleConfiguration::ReadwriteSplitting(Default::default())
                .is_on_rule_altered_action_enabled()
        );
    }

    #[test]
    fn scaling_policy_resolves_by_name() {
        let mut cfg = ShardingRuleConfiguration {
            scaling_name: Some("fast".to_string()),
            ..Default::default()
        };
        cfg.scaling.insert(
            "fast".to_string(),
            ScalingPolicy {
                read_batch_size: 5000,
                ..Default::default()
            },
        );
        let rule = RuleConfiguration::Sharding(cfg);
        assert_eq!(rule.scaling_policy().unwrap().read_batch_size, 5000);
        assert!(sharding(Some("missing")).scaling_policy().is_none());
    }

    #[test]
    fn rules_are_tagged_by_type() {
        let json = r#"[
            {"type":"sharding","tables":[{"logic_table":"t_order","actual_data_nodes":"ds_${0..1}.t_order_${0..1}"}],"scaling_name":"s"},
            {"type":"readwrite_splitting","data_sources":[{"name":"g","write_data_source_name":"w","read_data_source_names":["r0"]}]}
        ]"#;
        let rules: Vec<RuleConfiguration> = serde_json::from_str(json).unwrap();
        assert_eq!(rules[0].kind(), "sharding");
        assert_eq!(rules[0].scaling_name(), Some("s"));
        assert_eq!(rules[1].kind(), "readwrite_splitting");
    }

    #[test]
    fn global_rules_are_tagged_by_type() {
        let rule: GlobalRuleConfiguration = serde_json::from_str(
            r#"{"type":"sql_translator","provider":"NATIVE","use_original_sql_when_translating_failed":true}"#,
        )
        .unwrap();
        assert_eq!(rule.kind(), "sql_translator");
        match rule {
            GlobalRuleConfiguration::SqlTranslator(cfg) => {
                assert!(cfg.use_original_sql_when_translating_failed)
            }
            _ => panic!("expected SqlTranslator"),
        }
    }
}
