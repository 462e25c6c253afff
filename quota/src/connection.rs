//! Connections that hand out quota tables.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use common::{InMemoryTable, Table};

use crate::error::{Error, Result};
use crate::model::TableName;
use crate::status::ClusterConnection;

/// Source of table handles.
///
/// Connections that can also reach cluster services expose them through
/// [`Connection::as_cluster`].
pub trait Connection: Send + Sync {
    /// Returns a handle to the named table.
    fn table(&self, name: &TableName) -> Result<Arc<dyn Table>>;

    /// Cluster-level status calls, when this connection supports them.
    fn as_cluster(&self) -> Option<&dyn ClusterConnection> {
        None
    }
}

/// Connection over in-process [`InMemoryTable`]s.
///
/// Tables are created on first use and shared between callers.
#[derive(Clone, Default)]
pub struct LocalConnection {
    tables: Arc<RwLock<HashMap<TableName, InMemoryTable>>>,
    cluster: Option<Arc<dyn ClusterConnection>>,
}

impl LocalConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a cluster client, enabling the status calls.
    pub fn with_cluster(mut self, cluster: Arc<dyn ClusterConnection>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Returns the named table, creating it if needed.
    pub fn in_memory_table(&self, name: &TableName) -> Result<InMemoryTable> {
        if let Some(table) = self
            .tables
            .read()
            .map_err(|e| Error::Storage(format!("Failed to acquire read lock: {}", e)))?
            .get(name)
        {
            return Ok(table.clone());
        }
        let mut tables = self
            .tables
            .write()
            .map_err(|e| Error::Storage(format!("Failed to acquire write lock: {}", e)))?;
        Ok(tables.entry(name.clone()).or_default().clone())
    }
}

impl Connection for LocalConnection {
    fn table(&self, name: &TableName) -> Result<Arc<dyn Table>> {
        Ok(Arc::new(self.in_memory_table(name)?))
    }

    fn as_cluster(&self) -> Option<&dyn ClusterConnection> {
        self.cluster.as_deref()
    }
}

impl std::fmt::Debug for LocalConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalConnection")
            .field("cluster", &self.cluster.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use common::Mutation;

    use super::*;

    #[tokio::test]
    async fn should_share_table_between_handles() {
        // given
        let conn = LocalConnection::new();
        let name = TableName::new("hbase:quota");
        let writer = conn.table(&name).unwrap();

        // when
        writer
            .mutate(vec![Mutation::put("t.t1", "q", "s", "v")])
            .await
            .unwrap();

        // then
        let reader = conn.in_memory_table(&name).unwrap();
        assert_eq!(reader.cell_count().unwrap(), 1);
        let other = conn.in_memory_table(&TableName::new("other")).unwrap();
        assert_eq!(other.cell_count().unwrap(), 0);
    }

    #[test]
    fn should_not_expose_cluster_by_default() {
        let conn = LocalConnection::new();

        assert!(conn.as_cluster().is_none());
    }
}
