//! Storage nodes: deduplicated physical instances.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use shardgrid_core::{ConnectionDescriptor, DialectRegistry};
use tracing::debug;

use crate::datasource::{DataSource, physical_of};
use crate::error::TopologyResult;

/// Canonical identity of a physical instance: lowercased host and port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageNodeName(String);

impl StorageNodeName {
    pub fn new(host: &str, port: u16) -> Self {
        Self(format!("{}:{port}", host.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&ConnectionDescriptor> for StorageNodeName {
    fn from(descriptor: &ConnectionDescriptor) -> Self {
        Self::new(&descriptor.host, descriptor.port)
    }
}

impl fmt::Display for StorageNodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A physical instance together with the catalog one unit uses on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageNode {
    name: StorageNodeName,
    url: String,
    catalog: String,
}

impl StorageNode {
    pub fn new(name: StorageNodeName, url: impl Into<String>, catalog: impl Into<String>) -> Self {
        Self {
            name,
            url: url.into(),
            catalog: catalog.into(),
        }
    }

    pub fn name(&self) -> &StorageNodeName {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn catalog(&self) -> &str {
        &self.catalog
    }
}

/// Result of collapsing named connections onto physical instances.
#[derive(Debug)]
pub struct StorageNodeAggregation {
    /// Unit name → node, in input order.
    pub storage_nodes: IndexMap<String, StorageNode>,
    /// Unit name → parsed descriptor, in input order.
    pub descriptors: IndexMap<String, ConnectionDescriptor>,
    /// One retained physical handle per node.
    pub data_sources: IndexMap<StorageNodeName, Arc<dyn DataSource>>,
    /// Physical handles no unit needs any more. The caller releases them
    /// by dropping.
    pub redundant: Vec<Arc<dyn DataSource>>,
}

/// Group named handles by the physical instance their URL points at.
///
/// Handles share a node iff host (ignoring case) and port are equal. Each
/// node retains a physical handle that is already bound through a
/// catalog-switchable view when there is one, so units of an earlier
/// generation keep routing through the retained handle. Ties go to the
/// lexicographically smallest unit name, which keeps the assignment
/// independent of iteration order. Bound physical handles are never
/// reported redundant.
pub fn aggregate<'a, I>(data_sources: I, dialects: &DialectRegistry) -> TopologyResult<StorageNodeAggregation>
where
    I: IntoIterator<Item = (&'a String, &'a Arc<dyn DataSource>)>,
{
    let mut storage_nodes = IndexMap::new();
    let mut descriptors = IndexMap::new();
    // Node → ((unbound, unit name), physical); the smallest key wins.
    let mut owners: IndexMap<StorageNodeName, ((bool, &String), &Arc<dyn DataSource>)> = IndexMap::new();
    let mut seen = Vec::new();

    for (unit, handle) in data_sources {
        let props = handle.pool_properties();
        let descriptor = props.descriptor(dialects)?;
        let name = StorageNodeName::from(&descriptor);
        let physical = physical_of(handle);
        let switchable = handle.as_catalog_switchable().is_some();
        let rank = (!switchable, unit);

        owners
            .entry(name.clone())
            .and_modify(|owner| {
                if rank < owner.0 {
                    *owner = (rank, physical);
                }
            })
            .or_insert((rank, physical));

        storage_nodes.insert(
            unit.clone(),
            StorageNode::new(name.clone(), props.url.clone(), descriptor.catalog.clone()),
        );
        descriptors.insert(unit.clone(), descriptor);
        seen.push((name, physical, switchable));
    }

    let retained: IndexMap<StorageNodeName, Arc<dyn DataSource>> = owners
        .into_iter()
        .map(|(name, (_, handle))| (name, Arc::clone(handle)))
        .collect();

    let mut redundant: Vec<Arc<dyn DataSource>> = Vec::new();
    for (name, physical, _) in &seen {
        let bound = seen
            .iter()
            .any(|(_, other, switchable)| *switchable && Arc::ptr_eq(*other, *physical));
        let kept = retained.get(name).is_some_and(|h| Arc::ptr_eq(h, *physical));
        let listed = redundant.iter().any(|h| Arc::ptr_eq(h, *physical));
        if !(bound || kept || listed) {
            redundant.push(Arc::clone(*physical));
        }
    }

    debug!(
        units = storage_nodes.len(),
        nodes = retained.len(),
        redundant = redundant.len(),
        "storage nodes aggregated"
    );
    Ok(StorageNodeAggregation {
        storage_nodes,
        descriptors,
        data_sources: retained,
        redundant,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{CatalogSwitchableDataSource, PooledDataSource};
    use proptest::prelude::*;
    use shardgrid_core::{DataSourcePoolProperties, DescriptorError};

    use crate::error::TopologyError;

    fn handle(url: &str) -> Arc<dyn DataSource> {
        Arc::new(PooledDataSource::new(DataSourcePoolProperties::new(url)))
    }

    fn handles(units: &[(&str, &str)]) -> IndexMap<String, Arc<dyn DataSource>> {
        units.iter().map(|(name, url)| (name.to_string(), handle(url))).collect()
    }

    fn dialects() -> DialectRegistry {
        DialectRegistry::with_defaults().unwrap()
    }

    #[test]
    fn catalog_does_not_split_nodes() {
        let input = handles(&[
            ("a", "jdbc:mysql://db-x:3306/cat1"),
            ("b", "jdbc:mysql://DB-X:3306/cat2"),
            ("c", "jdbc:mysql://db-y:3306/cat1"),
        ]);
        let result = aggregate(&input, &dialects()).unwrap();

        assert_eq!(result.storage_nodes["a"].name(), result.storage_nodes["b"].name());
        assert_ne!(result.storage_nodes["a"].name(), result.storage_nodes["c"].name());
        assert_eq!(result.storage_nodes["b"].catalog(), "cat2");
        assert_eq!(result.data_sources.len(), 2);
        assert!(Arc::ptr_eq(&result.data_sources[result.storage_nodes["a"].name()], &input["a"]));
        assert_eq!(result.redundant.len(), 1);
        assert!(Arc::ptr_eq(&result.redundant[0], &input["b"]));
    }

    #[test]
    fn default_port_matches_explicit_port() {
        let input = handles(&[
            ("a", "jdbc:postgresql://pg/one"),
            ("b", "jdbc:postgresql://pg:5432/two"),
        ]);
        let result = aggregate(&input, &dialects()).unwrap();
        assert_eq!(result.storage_nodes["a"].name().as_str(), "pg:5432");
        assert_eq!(result.data_sources.len(), 1);
    }

    #[test]
    fn shared_physical_handle_is_not_redundant() {
        let physical = handle("jdbc:mysql://h:3306/a");
        let mut input = IndexMap::new();
        input.insert("a".to_string(), Arc::clone(&physical));
        let switchable: Arc<dyn DataSource> = Arc::new(CatalogSwitchableDataSource::new(
            Arc::clone(&physical),
            "b",
            "jdbc:mysql://h:3306/b",
        ));
        input.insert("b".to_string(), switchable);

        let result = aggregate(&input, &dialects()).unwrap();
        assert_eq!(result.data_sources.len(), 1);
        assert!(result.redundant.is_empty());
        assert_eq!(result.storage_nodes["b"].catalog(), "b");
    }

    #[test]
    fn bound_physical_handle_wins_over_smaller_unit_name() {
        let physical = handle("jdbc:mysql://h:3306/b");
        let switchable: Arc<dyn DataSource> = Arc::new(CatalogSwitchableDataSource::new(
            Arc::clone(&physical),
            "b",
            "jdbc:mysql://h:3306/b",
        ));
        let mut input = IndexMap::new();
        input.insert("b".to_string(), switchable);
        input.insert("a".to_string(), handle("jdbc:mysql://h:3306/a"));

        let result = aggregate(&input, &dialects()).unwrap();
        let node = result.storage_nodes["a"].name();
        assert!(Arc::ptr_eq(&result.data_sources[node], &physical));
        assert_eq!(result.redundant.len(), 1);
        assert!(Arc::ptr_eq(&result.redundant[0], &input["a"]));
    }

    #[test]
    fn unparsable_url_aborts() {
        let input = handles(&[("a", "jdbc:mysql://h:3306/a"), ("b", "jdbc:mysql://h:3306")]);
        let err = aggregate(&input, &dialects()).unwrap_err();
        assert!(matches!(
            err,
            TopologyError::Descriptor(DescriptorError::UnrecognizedUrl { .. })
        ));
    }

    fn unit_urls() -> impl Strategy<Value = Vec<(String, String)>> {
        prop::collection::vec((0..3usize, 0..2usize, "[a-z]{1,6}"), 1..12).prop_map(|specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (host, port, catalog))| {
                    let host = ["alpha", "BETA", "beta"][host];
                    let port = [3306, 3307][port];
                    (format!("ds_{i}"), format!("jdbc:mysql://{host}:{port}/{catalog}"))
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn assignment_ignores_input_order(
            (units, shuffled) in unit_urls().prop_flat_map(|units| {
                let shuffled = Just(units.clone()).prop_shuffle();
                (Just(units), shuffled)
            })
        ) {
            let created: IndexMap<String, Arc<dyn DataSource>> = units
                .iter()
                .map(|(name, url)| (name.clone(), handle(url)))
                .collect();
            let reordered: IndexMap<String, Arc<dyn DataSource>> = shuffled
                .iter()
                .map(|(name, _)| (name.clone(), Arc::clone(&created[name])))
                .collect();

            let dialects = dialects();
            let first = aggregate(&created, &dialects).unwrap();
            let second = aggregate(&reordered, &dialects).unwrap();

            prop_assert_eq!(&first.storage_nodes, &second.storage_nodes);
            prop_assert_eq!(first.data_sources.len(), second.data_sources.len());
            for (name, retained) in &first.data_sources {
                prop_assert!(Arc::ptr_eq(retained, &second.data_sources[name]));
            }
            prop_assert_eq!(
                first.redundant.len() + first.data_sources.len(),
                units.len()
            );
        }
    }
}
