//! shardgrid-state: persistence gateway for shardgrid.
//!
//! Backed by [redb](https://docs.rs/redb), provides a hierarchical key/value
//! namespace (`/metadata/{database}/rules`, `/scaling/{database}/jobs/{id}`)
//! holding both database metadata and scaling job state.
//!
//! # Architecture
//!
//! - **`repository`**: the [`PersistRepository`] gateway contract
//! - **`store`**: [`StateStore`], the redb implementation (on-disk or in-memory)
//! - **`paths`**: canonical key layout
//! - **`metadata`**: [`MetaDataPersistService`], typed access to database
//!   data sources, rules, global rules and props
//!
//! All values are JSON text. The `StateStore` is `Clone` + `Send` + `Sync`
//! (backed by `Arc<Database>`) and can be shared across threads.

pub mod error;
pub mod metadata;
pub mod paths;
pub mod repository;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use metadata::MetaDataPersistService;
pub use repository::PersistRepository;
pub use store::StateStore;
