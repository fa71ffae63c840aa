//! StateStore: redb-backed persistence gateway.
//!
//! Every entry lives in one table keyed by its full path. Subtree queries
//! (`exists`, `delete`, `list_children`) are range scans over the path
//! prefix. The conditional writes (`create_if_absent`,
//! `create_all_if_absent`, `put_if_equals`, `delete_if_equals`) run their
//! check and write inside a single write transaction; redb serializes
//! write transactions, so each is atomic across every clone of the store.
//! The store supports both on-disk and in-memory backends (the latter for
//! testing).

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::repository::{PersistRepository, check_path, child_prefix};
use crate::tables::REPOSITORY;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(REPOSITORY).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Every key under `prefix`, in order.
    fn keys_with_prefix(
        table: &impl ReadableTable<&'static str, &'static str>,
        prefix: &str,
    ) -> StateResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in table.range(prefix..).map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_string());
        }
        Ok(keys)
    }
}

impl PersistRepository for StateStore {
    fn get(&self, path: &str) -> StateResult<Option<String>> {
        check_path(path)?;
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(REPOSITORY).map_err(map_err!(Table))?;
        let value = table
            .get(path)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_string());
        Ok(value)
    }

    fn put(&self, path: &str, value: &str) -> StateResult<()> {
        check_path(path)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(REPOSITORY).map_err(map_err!(Table))?;
            table.insert(path, value).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%path, "entry stored");
        Ok(())
    }

    fn exists(&self, path: &str) -> StateResult<bool> {
        check_path(path)?;
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(REPOSITORY).map_err(map_err!(Table))?;
        if table.get(path).map_err(map_err!(Read))?.is_some() {
            return Ok(true);
        }
        let prefix = child_prefix(path);
        match table.range(prefix.as_str()..).map_err(map_err!(Read))?.next() {
            Some(entry) => {
                let (key, _) = entry.map_err(map_err!(Read))?;
                Ok(key.value().starts_with(prefix.as_str()))
            }
            None => Ok(false),
        }
    }

    fn delete(&self, path: &str) -> StateResult<bool> {
        check_path(path)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let removed;
        {
            let mut table = txn.open_table(REPOSITORY).map_err(map_err!(Table))?;
            let mut keys = Self::keys_with_prefix(&table, &child_prefix(path))?;
            keys.push(path.to_string());
            let mut count = 0usize;
            for key in &keys {
                if table.remove(key.as_str()).map_err(map_err!(Write))?.is_some() {
                    count += 1;
                }
            }
            removed = count;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%path, removed, "subtree deleted");
        Ok(removed > 0)
    }

    fn list_children(&self, path: &str) -> StateResult<Vec<String>> {
        check_path(path)?;
        let prefix = child_prefix(path);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(REPOSITORY).map_err(map_err!(Table))?;
        let mut children = BTreeSet::new();
        for key in Self::keys_with_prefix(&table, &prefix)? {
            let rest = &key[prefix.len()..];
            let child = rest.split('/').next().unwrap_or(rest);
            children.insert(child.to_string());
        }
        Ok(children.into_iter().collect())
    }

    fn create_if_absent(&self, path: &str, value: &str) -> StateResult<bool> {
        check_path(path)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let created;
        {
            let mut table = txn.open_table(REPOSITORY).map_err(map_err!(Table))?;
            created = table.get(path).map_err(map_err!(Read))?.is_none();
            if created {
                table.insert(path, value).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%path, created, "conditional create");
        Ok(created)
    }

    fn create_all_if_absent(&self, entries: &[(&str, &str)]) -> StateResult<bool> {
        for (path, _) in entries {
            check_path(path)?;
        }
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut created = true;
        {
            let mut table = txn.open_table(REPOSITORY).map_err(map_err!(Table))?;
            for (path, _) in entries {
                if table.get(*path).map_err(map_err!(Read))?.is_some() {
                    created = false;
                    break;
                }
            }
            if created {
                for (path, value) in entries {
                    table.insert(*path, *value).map_err(map_err!(Write))?;
                }
            }
        }
        if created {
            txn.commit().map_err(map_err!(Transaction))?;
        } else {
            txn.abort().map_err(map_err!(Transaction))?;
        }
        debug!(entries = entries.len(), created, "conditional batch create");
        Ok(created)
    }

    fn put_if_equals(&self, path: &str, expected: &str, value: &str) -> StateResult<bool> {
        check_path(path)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let swapped;
        {
            let mut table = txn.open_table(REPOSITORY).map_err(map_err!(Table))?;
            swapped = table
                .get(path)
                .map_err(map_err!(Read))?
                .is_some_and(|current| current.value() == expected);
            if swapped {
                table.insert(path, value).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%path, swapped, "compare and put");
        Ok(swapped)
    }

    fn delete_if_equals(&self, path: &str, expected: &str) -> StateResult<bool> {
        check_path(path)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let removed;
        {
            let mut table = txn.open_table(REPOSITORY).map_err(map_err!(Table))?;
            removed = table
                .get(path)
                .map_err(map_err!(Read))?
                .is_some_and(|current| current.value() == expected);
            if removed {
                table.remove(path).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%path, removed, "compare and delete");
        Ok(removed)
    }
}
