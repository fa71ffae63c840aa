//! Per-dialect connection URL parsing.
//!
//! Every supported database family registers one [`DialectParser`] in a
//! [`DialectRegistry`]. A parser turns a connection URL into a
//! [`ConnectionDescriptor`] (`host`, `port`, `catalog`), substituting the
//! dialect's default port when the URL omits one. A URL that does not match
//! the dialect's shape is rejected outright: a guessed descriptor would merge
//! or split storage nodes incorrectly.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Physical connection target extracted from a URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    /// Catalog (database/schema/service) exactly as written in the URL.
    pub catalog: String,
}

impl ConnectionDescriptor {
    /// Whether both descriptors point at the same server instance.
    ///
    /// The catalog takes no part in instance identity.
    pub fn is_same_instance(&self, other: &ConnectionDescriptor) -> bool {
        self.port == other.port && self.host.eq_ignore_ascii_case(&other.host)
    }
}

/// Errors raised while resolving or applying a dialect.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("unrecognized {dialect} url `{url}`, expected pattern `{pattern}`")]
    UnrecognizedUrl {
        dialect: String,
        url: String,
        pattern: String,
    },

    #[error("no registered dialect accepts url `{0}`")]
    UnsupportedUrl(String),

    #[error("unknown dialect: {0}")]
    UnknownDialect(String),

    #[error("invalid url pattern for dialect {dialect}: {reason}")]
    Pattern { dialect: String, reason: String },
}

pub type DescriptorResult<T> = Result<T, DescriptorError>;

/// Capability shared by all dialect parsers.
pub trait DialectParser: Send + Sync + fmt::Debug {
    /// Registry key, e.g. `MySQL`.
    fn name(&self) -> &str;

    /// Port substituted when the URL carries none.
    fn default_port(&self) -> u16;

    /// Lowercase URL prefixes this dialect claims during detection.
    fn url_prefixes(&self) -> &[&'static str];

    /// Parse a URL into a descriptor. Pure function of `url`.
    fn parse(&self, url: &str) -> DescriptorResult<ConnectionDescriptor>;
}

/// Dialect driven by a regex with `host`, optional `port`, and `catalog`
/// named groups.
#[derive(Debug)]
pub struct PatternDialect {
    name: &'static str,
    default_port: u16,
    prefixes: &'static [&'static str],
    pattern: Regex,
}

impl PatternDialect {
    pub fn new(
        name: &'static str,
        default_port: u16,
        prefixes: &'static [&'static str],
        pattern: &str,
    ) -> DescriptorResult<Self> {
        let pattern = Regex::new(pattern).map_err(|e| DescriptorError::Pattern {
            dialect: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            name,
            default_port,
            prefixes,
            pattern,
        })
    }

    pub fn mysql() -> DescriptorResult<Self> {
        Self::new(
            "MySQL",
            3306,
            &["jdbc:mysql:", "jdbc:mariadb:"],
            r"(?i)^jdbc:(?:mysql|mariadb)://(?P<host>[\w\-.]+)(?::(?P<port>\d+))?/(?P<catalog>[\w\-$]+)(?:\?.*)?$",
        )
    }

    pub fn postgresql() -> DescriptorResult<Self> {
        Self::new(
            "PostgreSQL",
            5432,
            &["jdbc:postgresql:"],
            r"(?i)^jdbc:postgresql://(?P<host>[\w\-.]+)(?::(?P<port>\d+))?/(?P<catalog>[\w\-$]+)(?:\?.*)?$",
        )
    }

    pub fn opengauss() -> DescriptorResult<Self> {
        Self::new(
            "openGauss",
            5431,
            &["jdbc:opengauss:"],
            r"(?i)^jdbc:opengauss://(?P<host>[\w\-.]+)(?::(?P<port>\d+))?/(?P<catalog>[\w\-$]+)(?:\?.*)?$",
        )
    }

    pub fn sqlserver() -> DescriptorResult<Self> {
        Self::new(
            "SQLServer",
            1433,
            &["jdbc:sqlserver:", "jdbc:microsoft:sqlserver:"],
            r"(?i)jdbc:(?:microsoft:)?sqlserver://(?P<host>[\w\-.]+):?(?P<port>\d*);\S*(?:DatabaseName|database)=(?P<catalog>[\w\-.]+);?",
        )
    }

    pub fn oracle() -> DescriptorResult<Self> {
        Self::new(
            "Oracle",
            1521,
            &["jdbc:oracle:"],
            r"(?i)^jdbc:oracle:thin:@(?://)?(?P<host>[\w\-.]+)(?::(?P<port>\d+))?[:/](?P<catalog>[A-Za-z_$][\w\-.$]*)$",
        )
    }

    fn unrecognized(&self, url: &str) -> DescriptorError {
        DescriptorError::UnrecognizedUrl {
            dialect: self.name.to_string(),
            url: url.to_string(),
            pattern: self.pattern.as_str().to_string(),
        }
    }
}

impl DialectParser for PatternDialect {
    fn name(&self) -> &str {
        self.name
    }

    fn default_port(&self) -> u16 {
        self.default_port
    }

    fn url_prefixes(&self) -> &[&'static str] {
        self.prefixes
    }

    fn parse(&self, url: &str) -> DescriptorResult<ConnectionDescriptor> {
        let caps = self
            .pattern
            .captures(url)
            .ok_or_else(|| self.unrecognized(url))?;
        let group = |name: &str| caps.name(name).map(|m| m.as_str()).filter(|s| !s.is_empty());

        let host = group("host").ok_or_else(|| self.unrecognized(url))?;
        let catalog = group("catalog").ok_or_else(|| self.unrecognized(url))?;
        let port = match group("port") {
            Some(port) => port.parse::<u16>().map_err(|_| self.unrecognized(url))?,
            None => self.default_port,
        };

        Ok(ConnectionDescriptor {
            host: host.to_string(),
            port,
            catalog: catalog.to_string(),
        })
    }
}

/// Named dialect parsers, looked up by name or detected from a URL prefix.
#[derive(Debug, Default)]
pub struct DialectRegistry {
    dialects: Vec<Box<dyn DialectParser>>,
}

impl DialectRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in dialect.
    pub fn with_defaults() -> DescriptorResult<Self> {
        let mut registry = Self::new();
        registry.register(Box::new(PatternDialect::mysql()?));
        registry.register(Box::new(PatternDialect::postgresql()?));
        registry.register(Box::new(PatternDialect::opengauss()?));
        registry.register(Box::new(PatternDialect::sqlserver()?));
        registry.register(Box::new(PatternDialect::oracle()?));
        Ok(registry)
    }

    /// Register a dialect, replacing any dialect with the same name.
    pub fn register(&mut self, dialect: Box<dyn DialectParser>) {
        self.dialects
            .retain(|d| !d.name().eq_ignore_ascii_case(dialect.name()));
        self.dialects.push(dialect);
    }

    /// Look up a dialect by name (case-insensitive).
    pub fn get(&self, name: &str) -> DescriptorResult<&dyn DialectParser> {
        self.dialects
            .iter()
            .find(|d| d.name().eq_ignore_ascii_case(name))
            .map(|d| &**d)
            .ok_or_else(|| DescriptorError::UnknownDialect(name.to_string()))
    }

    /// Pick the dialect whose URL prefix matches `url`.
    pub fn detect(&self, url: &str) -> DescriptorResult<&dyn DialectParser> {
        let lower = url.to_ascii_lowercase();
        self.dialects
            .iter()
            .find(|d| d.url_prefixes().iter().any(|p| lower.starts_with(p)))
            .map(|d| &**d)
            .ok_or_else(|| DescriptorError::UnsupportedUrl(url.to_string()))
    }

    /// Parse `url` with the named dialect, or the detected one when `dialect`
    /// is `None`.
    pub fn parse(&self, dialect: Option<&str>, url: &str) -> DescriptorResult<ConnectionDescriptor> {
        match dialect {
            Some(name) => self.get(name)?.parse(url),
            None => self.detect(url)?.parse(url),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.dialects.iter().map(|d| d.name()).collect()
    }
}
