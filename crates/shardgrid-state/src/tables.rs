//! redb table definitions for the shardgrid state store.

use redb::TableDefinition;

/// Every repository entry, keyed by its full `/`-separated path.
///
/// Keys sort lexicographically, so a subtree `{path}/…` is one contiguous
/// range.
pub const REPOSITORY: TableDefinition<&str, &str> = TableDefinition::new("repository");
