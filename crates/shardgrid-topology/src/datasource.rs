//! Connection handles shared between topology generations.
//!
//! Handles are reference counted. A physical pool is released when the last
//! `Arc` pointing at it is dropped, which happens only after every topology
//! generation referencing it is gone.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use shardgrid_core::{DataSourceConfigurations, DataSourcePoolProperties};
use tracing::debug;

/// A connection source a storage unit can route to.
pub trait DataSource: Send + Sync + fmt::Debug {
    /// Properties the handle was created from.
    fn pool_properties(&self) -> &DataSourcePoolProperties;

    /// The catalog-switching view of this handle, when it is one.
    fn as_catalog_switchable(&self) -> Option<&CatalogSwitchableDataSource> {
        None
    }
}

/// A connection pool to one physical instance.
///
/// Opening connections is the pool library's concern; this type carries the
/// identity and properties the topology needs.
#[derive(Debug)]
pub struct PooledDataSource {
    properties: DataSourcePoolProperties,
}

impl PooledDataSource {
    pub fn new(properties: DataSourcePoolProperties) -> Self {
        debug!(url = %properties.url, max_pool_size = properties.max_pool_size, "data source created");
        Self { properties }
    }
}

impl DataSource for PooledDataSource {
    fn pool_properties(&self) -> &DataSourcePoolProperties {
        &self.properties
    }
}

impl Drop for PooledDataSource {
    fn drop(&mut self) {
        debug!(url = %self.properties.url, "data source released");
    }
}

/// A physical handle bound to one catalog of its instance.
///
/// Several storage units on the same instance share one physical handle,
/// each through its own switchable view.
#[derive(Debug)]
pub struct CatalogSwitchableDataSource {
    physical: Arc<dyn DataSource>,
    catalog: String,
    url: String,
    properties: DataSourcePoolProperties,
}

impl CatalogSwitchableDataSource {
    pub fn new(physical: Arc<dyn DataSource>, catalog: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        let properties = physical.pool_properties().with_url(&url);
        Self {
            physical,
            catalog: catalog.into(),
            url,
            properties,
        }
    }

    pub fn physical(&self) -> &Arc<dyn DataSource> {
        &self.physical
    }

    pub fn catalog(&self) -> &str {
        &self.catalog
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl DataSource for CatalogSwitchableDataSource {
    fn pool_properties(&self) -> &DataSourcePoolProperties {
        &self.properties
    }

    fn as_catalog_switchable(&self) -> Option<&CatalogSwitchableDataSource> {
        Some(self)
    }
}

/// The physical handle behind `handle`.
pub(crate) fn physical_of(handle: &Arc<dyn DataSource>) -> &Arc<dyn DataSource> {
    match handle.as_catalog_switchable() {
        Some(switchable) => switchable.physical(),
        None => handle,
    }
}

/// Create one pooled handle per configured unit, in declaration order.
pub fn create_data_sources(configs: &DataSourceConfigurations) -> IndexMap<String, Arc<dyn DataSource>> {
    configs
        .iter()
        .map(|(name, props)| {
            let handle: Arc<dyn DataSource> = Arc::new(PooledDataSource::new(props.clone()));
            (name.clone(), handle)
        })
        .collect()
}
