//! Configuration for the quota table layer.

use serde::{Deserialize, Serialize};

use crate::connection::LocalConnection;
use crate::error::{Error, Result};
use crate::model::TableName;

/// Name of the system table holding quota settings and usage.
pub const DEFAULT_QUOTA_TABLE_NAME: &str = "hbase:quota";

/// Configuration for opening a [`QuotaTable`](crate::QuotaTable).
///
/// # Example
///
/// ```
/// use quota::Config;
///
/// let config = Config::from_yaml("table_name: \"ops:quota\"").unwrap();
/// assert_eq!(config.quota_table_name().namespace(), "ops");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Table the quota rows live in.
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Where quota tables are stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StorageConfig {
    #[default]
    InMemory,
}

fn default_table_name() -> String {
    DEFAULT_QUOTA_TABLE_NAME.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Parses a YAML document. Missing fields take their defaults.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn quota_table_name(&self) -> TableName {
        TableName::new(self.table_name.clone())
    }

    /// Builds a connection for the configured backend.
    pub fn open_connection(&self) -> LocalConnection {
        match self.storage {
            StorageConfig::InMemory => LocalConnection::new(),
        }
    }
}
