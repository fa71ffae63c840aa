//! Logical storage units exposed to routing.

use std::sync::Arc;

use shardgrid_core::{ConnectionDescriptor, DataSourcePoolProperties};

use crate::datasource::{CatalogSwitchableDataSource, DataSource};
use crate::node::StorageNode;

/// A logical unit name bound to a catalog on a physical instance.
#[derive(Debug, Clone)]
pub struct StorageUnit {
    database_name: Option<String>,
    storage_node: StorageNode,
    descriptor: ConnectionDescriptor,
    pool_properties: DataSourcePoolProperties,
    data_source: Arc<dyn DataSource>,
}

impl StorageUnit {
    /// Bind `handle` to the node's catalog.
    ///
    /// A handle that is already catalog-switchable is kept as is; anything
    /// else is replaced by a switchable view over `physical`.
    pub(crate) fn bind(
        database_name: Option<&str>,
        storage_node: StorageNode,
        descriptor: ConnectionDescriptor,
        pool_properties: DataSourcePoolProperties,
        handle: &Arc<dyn DataSource>,
        physical: &Arc<dyn DataSource>,
    ) -> Self {
        let data_source: Arc<dyn DataSource> = if handle.as_catalog_switchable().is_some() {
            Arc::clone(handle)
        } else {
            Arc::new(CatalogSwitchableDataSource::new(
                Arc::clone(physical),
                storage_node.catalog(),
                storage_node.url(),
            ))
        };
        Self {
            database_name: database_name.map(str::to_string),
            storage_node,
            descriptor,
            pool_properties,
            data_source,
        }
    }

    /// Owning database; `None` for units shared by every database.
    pub fn database_name(&self) -> Option<&str> {
        self.database_name.as_deref()
    }

    pub fn storage_node(&self) -> &StorageNode {
        &self.storage_node
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    pub fn catalog(&self) -> &str {
        self.storage_node.catalog()
    }

    pub fn pool_properties(&self) -> &DataSourcePoolProperties {
        &self.pool_properties
    }

    /// The catalog-switchable handle routing uses.
    pub fn data_source(&self) -> &Arc<dyn DataSource> {
        &self.data_source
    }
}
