//! ResourceTopology: the storage units of one logical database.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use shardgrid_core::{
    ConnectionDescriptor, DataSourceConfigurations, DataSourcePoolProperties, DialectRegistry,
};
use tracing::debug;

use crate::datasource::{DataSource, physical_of};
use crate::error::{TopologyError, TopologyResult};
use crate::node::{StorageNode, StorageNodeName, aggregate};
use crate::unit::StorageUnit;

/// Immutable registry of storage units and the physical handles behind
/// them.
///
/// Every unit's storage node has an entry in the node map. Evolution
/// methods return a new topology and leave `self` untouched.
#[derive(Debug, Clone)]
pub struct ResourceTopology {
    database_name: Option<String>,
    data_sources: IndexMap<StorageNodeName, Arc<dyn DataSource>>,
    storage_units: IndexMap<String, StorageUnit>,
}

impl ResourceTopology {
    /// Build from freshly created handles keyed by unit name.
    ///
    /// Units pointing at the same host and port share one physical handle;
    /// the other handles are dropped. Duplicate physical targets are not an
    /// error, an unparsable URL is.
    pub fn new(
        database_name: Option<&str>,
        data_sources: &IndexMap<String, Arc<dyn DataSource>>,
        dialects: &DialectRegistry,
    ) -> TopologyResult<Self> {
        let entries = data_sources
            .iter()
            .map(|(name, handle)| (name.clone(), Arc::clone(handle), handle.pool_properties().clone()))
            .collect();
        Self::assemble(database_name, entries, dialects)
    }

    /// Rebuild from an explicit unit → node assignment, one handle per node
    /// and the pool properties of every unit.
    pub fn from_storage_nodes(
        database_name: Option<&str>,
        data_sources: IndexMap<StorageNodeName, Arc<dyn DataSource>>,
        storage_nodes: &IndexMap<String, StorageNode>,
        pool_properties: &DataSourceConfigurations,
        dialects: &DialectRegistry,
    ) -> TopologyResult<Self> {
        let data_sources: IndexMap<StorageNodeName, Arc<dyn DataSource>> = data_sources
            .into_iter()
            .map(|(name, handle)| {
                let physical = Arc::clone(physical_of(&handle));
                (name, physical)
            })
            .collect();

        let mut storage_units = IndexMap::with_capacity(storage_nodes.len());
        for (unit, node) in storage_nodes {
            let physical = data_sources.get(node.name()).ok_or_else(|| {
                TopologyError::MissingStorageNode {
                    unit: unit.clone(),
                    node: node.name().to_string(),
                }
            })?;
            let props = pool_properties
                .get(unit)
                .ok_or_else(|| TopologyError::MissingPoolProperties(unit.clone()))?;
            let descriptor = dialects.parse(props.dialect.as_deref(), node.url())?;
            storage_units.insert(
                unit.clone(),
                StorageUnit::bind(
                    database_name,
                    node.clone(),
                    descriptor,
                    props.clone(),
                    physical,
                    physical,
                ),
            );
        }

        debug!(
            database = database_name.unwrap_or("<global>"),
            units = storage_units.len(),
            nodes = data_sources.len(),
            "resource topology rebuilt from storage nodes"
        );
        Ok(Self {
            database_name: database_name.map(str::to_string),
            data_sources,
            storage_units,
        })
    }

    fn assemble(
        database_name: Option<&str>,
        entries: Vec<(String, Arc<dyn DataSource>, DataSourcePoolProperties)>,
        dialects: &DialectRegistry,
    ) -> TopologyResult<Self> {
        let aggregation = aggregate(entries.iter().map(|(name, handle, _)| (name, handle)), dialects)?;

        let mut storage_units = IndexMap::with_capacity(entries.len());
        for (name, handle, props) in entries {
            let node = aggregation.storage_nodes[&name].clone();
            let descriptor = aggregation.descriptors[&name].clone();
            let physical = &aggregation.data_sources[node.name()];
            let unit = StorageUnit::bind(database_name, node, descriptor, props, &handle, physical);
            storage_units.insert(name, unit);
        }

        debug!(
            database = database_name.unwrap_or("<global>"),
            units = storage_units.len(),
            nodes = aggregation.data_sources.len(),
            released = aggregation.redundant.len(),
            "resource topology built"
        );
        Ok(Self {
            database_name: database_name.map(str::to_string),
            data_sources: aggregation.data_sources,
            storage_units,
        })
    }

    // ── Queries ────────────────────────────────────────────────────

    /// One unit name per physical instance, in unit order.
    ///
    /// Instance identity is host and port; the catalog is ignored.
    pub fn get_all_instance_data_source_names(&self) -> Vec<String> {
        let mut representatives: Vec<(&String, &ConnectionDescriptor)> = Vec::new();
        for (name, unit) in &self.storage_units {
            let descriptor = unit.descriptor();
            if !representatives
                .iter()
                .any(|(_, seen)| seen.is_same_instance(descriptor))
            {
                representatives.push((name, descriptor));
            }
        }
        representatives.into_iter().map(|(name, _)| name.clone()).collect()
    }

    /// The candidate names that are not units of this topology.
    pub fn get_not_existed_data_sources<I, S>(&self, names: I) -> HashSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .filter(|name| !self.storage_units.contains_key(name))
            .collect()
    }

    pub fn database_name(&self) -> Option<&str> {
        self.database_name.as_deref()
    }

    pub fn storage_units(&self) -> &IndexMap<String, StorageUnit> {
        &self.storage_units
    }

    pub fn get_storage_unit(&self, name: &str) -> Option<&StorageUnit> {
        self.storage_units.get(name)
    }

    pub fn storage_unit_names(&self) -> Vec<&str> {
        self.storage_units.keys().map(String::as_str).collect()
    }

    /// Retained physical handle per storage node.
    pub fn data_sources(&self) -> &IndexMap<StorageNodeName, Arc<dyn DataSource>> {
        &self.data_sources
    }

    pub fn storage_nodes(&self) -> IndexMap<String, StorageNode> {
        self.storage_units
            .iter()
            .map(|(name, unit)| (name.clone(), unit.storage_node().clone()))
            .collect()
    }

    pub fn data_source_pool_properties(&self) -> DataSourceConfigurations {
        self.storage_units
            .iter()
            .map(|(name, unit)| (name.clone(), unit.pool_properties().clone()))
            .collect()
    }

    // ── Evolution ──────────────────────────────────────────────────

    /// A new generation with `additions` appended.
    ///
    /// Existing units keep their handles, so no handle is wrapped twice.
    pub fn with_storage_units(
        &self,
        additions: &IndexMap<String, Arc<dyn DataSource>>,
        dialects: &DialectRegistry,
    ) -> TopologyResult<Self> {
        if let Some(name) = additions.keys().find(|name| self.storage_units.contains_key(*name)) {
            return Err(TopologyError::DuplicateStorageUnit(name.clone()));
        }
        let entries = self
            .storage_units
            .iter()
            .map(|(name, unit)| {
                (
                    name.clone(),
                    Arc::clone(unit.data_source()),
                    unit.pool_properties().clone(),
                )
            })
            .chain(additions.iter().map(|(name, handle)| {
                (name.clone(), Arc::clone(handle), handle.pool_properties().clone())
            }))
            .collect();
        Self::assemble(self.database_name(), entries, dialects)
    }

    /// A new generation without the named units.
    pub fn without_storage_units<S: AsRef<str>>(&self, names: &[S]) -> TopologyResult<Self> {
        let removed: HashSet<&str> = names.iter().map(|name| name.as_ref()).collect();
        if let Some(missing) = removed.iter().find(|name| !self.storage_units.contains_key(**name)) {
            return Err(TopologyError::StorageUnitNotFound(missing.to_string()));
        }

        let storage_units: IndexMap<String, StorageUnit> = self
            .storage_units
            .iter()
            .filter(|(name, _)| !removed.contains(name.as_str()))
            .map(|(name, unit)| (name.clone(), unit.clone()))
            .collect();
        let referenced: HashSet<&StorageNodeName> =
            storage_units.values().map(|unit| unit.storage_node().name()).collect();
        let data_sources = self
            .data_sources
            .iter()
            .filter(|(name, _)| referenced.contains(name))
            .map(|(name, handle)| (name.clone(), Arc::clone(handle)))
            .collect();

        debug!(
            database = self.database_name().unwrap_or("<global>"),
            removed = removed.len(),
            remaining = storage_units.len(),
            "storage units removed"
        );
        Ok(Self {
            database_name: self.database_name.clone(),
            data_sources,
            storage_units,
        })
    }
}
