//! MetaDataPersistService: typed metadata access over a repository.
//!
//! Stores, per logical database, the ordered data source configurations and
//! the rule configurations; globally, the global rules and properties. The
//! repository is injected so callers (and tests) choose the backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use shardgrid_core::{DataSourceConfigurations, GlobalRuleConfiguration, RuleConfiguration};

use crate::error::{StateError, StateResult};
use crate::paths;
use crate::repository::PersistRepository;

#[derive(Clone)]
pub struct MetaDataPersistService {
    repository: Arc<dyn PersistRepository>,
}

impl MetaDataPersistService {
    pub fn new(repository: Arc<dyn PersistRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn PersistRepository> {
        &self.repository
    }

    // ── Databases ──────────────────────────────────────────────────

    /// Register a database. Returns false if it was already registered.
    pub fn add_database(&self, database: &str) -> StateResult<bool> {
        paths::check_segment(database)?;
        let created = self.repository.create_if_absent(&paths::database(database), "")?;
        if created {
            info!(%database, "database added");
        }
        Ok(created)
    }

    /// Remove a database and all of its metadata.
    pub fn drop_database(&self, database: &str) -> StateResult<bool> {
        paths::check_segment(database)?;
        let existed = self.repository.delete(&paths::database(database))?;
        info!(%database, existed, "database dropped");
        Ok(existed)
    }

    pub fn load_all_database_names(&self) -> StateResult<Vec<String>> {
        self.repository.list_children(paths::METADATA_ROOT)
    }

    // ── Database configuration ─────────────────────────────────────

    /// Persist the data sources and rules of a database, registering it
    /// first if needed.
    pub fn persist_configurations(
        &self,
        database: &str,
        data_sources: &DataSourceConfigurations,
        rules: &[RuleConfiguration],
    ) -> StateResult<()> {
        self.add_database(database)?;
        self.put_json(&paths::data_sources(database), data_sources)?;
        self.put_json(&paths::database_rules(database), &rules)?;
        debug!(
            %database,
            data_sources = data_sources.len(),
            rules = rules.len(),
            "database configuration persisted"
        );
        Ok(())
    }

    /// Data source configurations in declaration order; empty when none are
    /// stored.
    pub fn load_data_source_configurations(
        &self,
        database: &str,
    ) -> StateResult<DataSourceConfigurations> {
        paths::check_segment(database)?;
        Ok(self
            .get_json(&paths::data_sources(database))?
            .unwrap_or_default())
    }

    pub fn load_rule_configurations(&self, database: &str) -> StateResult<Vec<RuleConfiguration>> {
        paths::check_segment(database)?;
        Ok(self
            .get_json(&paths::database_rules(database))?
            .unwrap_or_default())
    }

    // ── Global configuration ───────────────────────────────────────

    pub fn persist_global_rule_configuration(
        &self,
        rules: &[GlobalRuleConfiguration],
        props: &BTreeMap<String, String>,
    ) -> StateResult<()> {
        self.put_json(paths::GLOBAL_RULES, &rules)?;
        self.put_json(paths::PROPS, props)?;
        debug!(rules = rules.len(), props = props.len(), "global configuration persisted");
        Ok(())
    }

    pub fn load_global_rules(&self) -> StateResult<Vec<GlobalRuleConfiguration>> {
        Ok(self.get_json(paths::GLOBAL_RULES)?.unwrap_or_default())
    }

    pub fn load_props(&self) -> StateResult<BTreeMap<String, String>> {
        Ok(self.get_json(paths::PROPS)?.unwrap_or_default())
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn put_json<T: Serialize + ?Sized>(&self, path: &str, value: &T) -> StateResult<()> {
        let json = serde_json::to_string(value).map_err(|e| StateError::Serialize(e.to_string()))?;
        self.repository.put(path, &json)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> StateResult<Option<T>> {
        match self.repository.get(path)? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| StateError::Deserialize {
                    path: path.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }
}
