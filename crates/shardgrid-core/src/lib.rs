pub mod config;
pub mod datasource;
pub mod dialect;
pub mod rule;

pub use config::ShardgridConfig;
pub use datasource::{DataSourceConfigurations, DataSourcePoolProperties};
pub use dialect::{
    ConnectionDescriptor, DescriptorError, DescriptorResult, DialectParser, DialectRegistry,
    PatternDialect,
};
pub use rule::*;
