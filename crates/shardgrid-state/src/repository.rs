//! The persistence gateway contract.

use std::sync::Arc;

use crate::error::{StateError, StateResult};

/// Hierarchical key/value store shared by metadata and job state.
///
/// Paths are absolute and `/`-separated (`/scaling/sharding_db/active`). A
/// path "exists" when it holds a value or has descendants. Implementations
/// may block on I/O; callers must not hold in-process locks across calls.
pub trait PersistRepository: Send + Sync {
    /// Value stored at exactly `path`.
    fn get(&self, path: &str) -> StateResult<Option<String>>;

    /// Insert or overwrite the value at `path`.
    fn put(&self, path: &str, value: &str) -> StateResult<()>;

    /// Whether `path` holds a value or has any descendant.
    fn exists(&self, path: &str) -> StateResult<bool>;

    /// Delete `path` and everything beneath it. Returns true if anything
    /// was removed.
    fn delete(&self, path: &str) -> StateResult<bool>;

    /// Names of the direct children of `path`, sorted and deduplicated.
    fn list_children(&self, path: &str) -> StateResult<Vec<String>>;

    /// Atomically write `value` only if `path` holds no value. Returns true
    /// when this call performed the write.
    fn create_if_absent(&self, path: &str, value: &str) -> StateResult<bool>;

    /// Atomically write every entry only if none of the paths holds a
    /// value. Returns true when this call performed the writes; on false
    /// nothing was written.
    fn create_all_if_absent(&self, entries: &[(&str, &str)]) -> StateResult<bool>;

    /// Atomically replace the value at `path` only if it currently equals
    /// `expected`. Returns false, writing nothing, when the value differs
    /// or is absent.
    fn put_if_equals(&self, path: &str, expected: &str, value: &str) -> StateResult<bool>;

    /// Atomically delete the value at exactly `path` only if it equals
    /// `expected`. Descendants are untouched.
    fn delete_if_equals(&self, path: &str, expected: &str) -> StateResult<bool>;
}

impl<T: PersistRepository + ?Sized> PersistRepository for Arc<T> {
    fn get(&self, path: &str) -> StateResult<Option<String>> {
        (**self).get(path)
    }

    fn put(&self, path: &str, value: &str) -> StateResult<()> {
        (**self).put(path, value)
    }

    fn exists(&self, path: &str) -> StateResult<bool> {
        (**self).exists(path)
    }

    fn delete(&self, path: &str) -> StateResult<bool> {
        (**self).delete(path)
    }

    fn list_children(&self, path: &str) -> StateResult<Vec<String>> {
        (**self).list_children(path)
    }

    fn create_if_absent(&self, path: &str, value: &str) -> StateResult<bool> {
        (**self).create_if_absent(path, value)
    }

    fn create_all_if_absent(&self, entries: &[(&str, &str)]) -> StateResult<bool> {
        (**self).create_all_if_absent(entries)
    }

    fn put_if_equals(&self, path: &str, expected: &str, value: &str) -> StateResult<bool> {
        (**self).put_if_equals(path, expected, value)
    }

    fn delete_if_equals(&self, path: &str, expected: &str) -> StateResult<bool> {
        (**self).delete_if_equals(path, expected)
    }
}

/// Reject paths that are relative, end in `/`, or contain empty segments.
pub fn check_path(path: &str) -> StateResult<()> {
    let valid = path == "/"
        || (path.starts_with('/') && !path.ends_with('/') && !path.contains("//"));
    if valid {
        Ok(())
    } else {
        Err(StateError::InvalidPath(path.to_string()))
    }
}

/// Prefix shared by every descendant of `path`.
pub(crate) fn child_prefix(path: &str) -> String {
    if path == "/" {
        "/".to_string()
    } else {
        format!("{path}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_validation() {
        assert!(check_path("/").is_ok());
        assert!(check_path("/metadata/sharding_db").is_ok());
        assert!(check_path("metadata").is_err());
        assert!(check_path("/metadata/").is_err());
        assert!(check_path("/metadata//rules").is_err());
        assert!(check_path("").is_err());
    }

    #[test]
    fn child_prefix_of_root() {
        assert_eq!(child_prefix("/"), "/");
        assert_eq!(child_prefix("/scaling"), "/scaling/");
    }
}
