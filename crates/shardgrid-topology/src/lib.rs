//! shardgrid-topology: storage resource topology.
//!
//! Turns named raw connections into deduplicated physical instances
//! ("storage nodes") and exposes catalog-switchable logical storage units
//! on top of them.
//!
//! # Architecture
//!
//! ```text
//! TopologyRegistry (database → Arc<ResourceTopology>, swapped atomically)
//!   └── ResourceTopology
//!       ├── storage node name → retained physical handle
//!       └── unit name → StorageUnit
//!           ├── StorageNode (name, url, catalog)
//!           ├── DataSourcePoolProperties
//!           └── CatalogSwitchableDataSource → physical handle
//! ```
//!
//! A published topology is never mutated; evolving one builds a new
//! generation that shares the physical handles of the previous one.

pub mod datasource;
pub mod error;
pub mod node;
pub mod registry;
pub mod topology;
pub mod unit;

pub use datasource::{CatalogSwitchableDataSource, DataSource, PooledDataSource, create_data_sources};
pub use error::{TopologyError, TopologyResult};
pub use node::{StorageNode, StorageNodeAggregation, StorageNodeName, aggregate};
pub use registry::TopologyRegistry;
pub use topology::ResourceTopology;
pub use unit::StorageUnit;
