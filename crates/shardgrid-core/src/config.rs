//! shardgrid.toml configuration parser.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::datasource::{DataSourceConfigurations, DataSourcePoolProperties};
use crate::rule::{GlobalRuleConfiguration, RuleConfiguration, TransactionRuleConfiguration};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardgridConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<GlobalRuleConfiguration>,
    #[serde(default)]
    pub databases: IndexMap<String, DatabaseConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the persisted metadata and job state.
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/shardgrid"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub data_sources: DataSourceConfigurations,
    #[serde(default)]
    pub rules: Vec<RuleConfiguration>,
}

impl ShardgridConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ShardgridConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a config with one database backed by `count` MySQL units on
    /// a single local instance.
    pub fn scaffold(database: &str, count: usize) -> Self {
        let data_sources = (0..count)
            .map(|i| {
                (
                    format!("ds_{i}"),
                    DataSourcePoolProperties::new(format!("jdbc:mysql://127.0.0.1:3306/demo_ds_{i}"))
                        .with_username("root"),
                )
            })
            .collect();
        let mut databases = IndexMap::new();
        databases.insert(
            database.to_string(),
            DatabaseConfig {
                data_sources,
                rules: Vec::new(),
            },
        );
        ShardgridConfig {
            store: StoreConfig::default(),
            props: BTreeMap::new(),
            rules: vec![GlobalRuleConfiguration::Transaction(
                TransactionRuleConfiguration::default(),
            )],
            databases,
        }
    }
}
