//! TopologyRegistry: the published topology of every logical database.
//!
//! Readers clone an `Arc` snapshot and never observe a half-built
//! generation. Writers build the next generation outside the lock and swap
//! it in; the lock is only held for the map operation itself.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{TopologyError, TopologyResult};
use crate::topology::ResourceTopology;

#[derive(Debug, Default)]
pub struct TopologyRegistry {
    topologies: RwLock<HashMap<String, Arc<ResourceTopology>>>,
}

impl TopologyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `topology` for `database`, returning the replaced generation.
    pub fn publish(&self, database: &str, topology: ResourceTopology) -> Option<Arc<ResourceTopology>> {
        let units = topology.storage_units().len();
        let previous = self
            .topologies
            .write()
            .insert(database.to_string(), Arc::new(topology));
        info!(%database, units, replaced = previous.is_some(), "topology published");
        previous
    }

    pub fn get(&self, database: &str) -> Option<Arc<ResourceTopology>> {
        self.topologies.read().get(database).cloned()
    }

    pub fn remove(&self, database: &str) -> Option<Arc<ResourceTopology>> {
        let removed = self.topologies.write().remove(database);
        if removed.is_some() {
            info!(%database, "topology removed");
        }
        removed
    }

    /// Names of all databases with a published topology, sorted.
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topologies.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Derive and publish the next generation of `database`'s topology.
    ///
    /// `build` runs without the lock held. If another writer published in
    /// the meantime, `build` runs again against the newer generation.
    pub fn alter<F>(&self, database: &str, mut build: F) -> TopologyResult<Arc<ResourceTopology>>
    where
        F: FnMut(&ResourceTopology) -> TopologyResult<ResourceTopology>,
    {
        loop {
            let current = self
                .get(database)
                .ok_or_else(|| TopologyError::DatabaseNotFound(database.to_string()))?;
            let next = Arc::new(build(&current)?);

            let mut topologies = self.topologies.write();
            let unchanged = topologies
                .get(database)
                .map(|published| Arc::ptr_eq(published, &current));
            match unchanged {
                Some(true) => {
                    topologies.insert(database.to_string(), Arc::clone(&next));
                    info!(%database, units = next.storage_units().len(), "topology altered");
                    return Ok(next);
                }
                Some(false) => {
                    debug!(%database, "topology changed concurrently, rebuilding");
                }
                None => return Err(TopologyError::DatabaseNotFound(database.to_string())),
            }
        }
    }
}
