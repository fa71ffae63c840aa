//! Pooled-connection properties for a storage unit.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dialect::{ConnectionDescriptor, DescriptorResult, DialectRegistry};

/// Data source properties keyed by storage unit name, in declaration order.
pub type DataSourceConfigurations = IndexMap<String, DataSourcePoolProperties>;

/// Properties a connection pool is created from.
///
/// The values are carried verbatim; sizing policy belongs to the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourcePoolProperties {
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Dialect name; detected from the URL prefix when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialect: Option<String>,
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,
    #[serde(default = "default_min_pool_size")]
    pub min_pool_size: u32,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Driver/pool specific extras.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, String>,
}

fn default_max_pool_size() -> u32 {
    10
}

fn default_min_pool_size() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    5_000
}

fn default_idle_timeout_ms() -> u64 {
    300_000
}

impl DataSourcePoolProperties {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: String::new(),
            password: None,
            dialect: None,
            max_pool_size: default_max_pool_size(),
            min_pool_size: default_min_pool_size(),
            connection_timeout_ms: default_connection_timeout_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            custom: BTreeMap::new(),
        }
    }

    /// Builder method: set the user name.
    pub fn with_username(self, username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..self
        }
    }

    /// Builder method: pin the dialect instead of detecting it.
    pub fn with_dialect(self, dialect: impl Into<String>) -> Self {
        Self {
            dialect: Some(dialect.into()),
            ..self
        }
    }

    /// Copy of these properties pointing at another URL.
    pub fn with_url(&self, url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..self.clone()
        }
    }

    /// Parse the URL with the pinned or detected dialect.
    pub fn descriptor(&self, dialects: &DialectRegistry) -> DescriptorResult<ConnectionDescriptor> {
        dialects.parse(self.dialect.as_deref(), &self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let props: DataSourcePoolProperties =
            serde_json::from_str(r#"{"url":"jdbc:mysql://h:3306/db"}"#).unwrap();
        assert_eq!(props, DataSourcePoolProperties::new("jdbc:mysql://h:3306/db"));
        assert_eq!(props.max_pool_size, 10);
    }

    #[test]
    fn descriptor_uses_pinned_dialect() {
        let dialects = DialectRegistry::with_defaults().unwrap();
        let props = DataSourcePoolProperties::new("jdbc:postgresql://pg:6432/app").with_dialect("PostgreSQL");
        let d = props.descriptor(&dialects).unwrap();
        assert_eq!((d.host.as_str(), d.port), ("pg", 6432));
    }

    #[test]
    fn with_url_keeps_other_properties() {
        let props = DataSourcePoolProperties::new("jdbc:mysql://h/a").with_username("root");
        let moved = props.with_url("jdbc:mysql://h/b");
        assert_eq!(moved.username, "root");
        assert_eq!(moved.url, "jdbc:mysql://h/b");
    }

    #[test]
    fn configurations_keep_declaration_order() {
        let json = r#"{"ds_2":{"url":"jdbc:mysql://h/c"},"ds_0":{"url":"jdbc:mysql://h/a"},"ds_1":{"url":"jdbc:mysql://h/b"}}"#;
        let configs: DataSourceConfigurations = serde_json::from_str(json).unwrap();
        let names: Vec<&str> = configs.keys().map(String::as_str).collect();
        assert_eq!(names, ["ds_2", "ds_0", "ds_1"]);
    }
}
