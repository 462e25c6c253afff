//! Status calls against the master and region servers.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::model::{ServerName, SpaceQuotaSnapshot, SpaceViolationPolicy, TableName};
use crate::proto;

/// Size of one table as reported to the master.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSize {
    pub table: TableName,
    pub size: u64,
}

/// Cluster-level RPCs available on capable connections.
///
/// Snapshots cross the wire as protobuf messages and are converted by the
/// helpers in this module.
#[async_trait]
pub trait ClusterConnection: Send + Sync {
    /// Table sizes the master has collected from region servers.
    async fn master_table_sizes(&self) -> Result<Vec<TableSize>>;

    /// Space snapshots a region server holds, one per table.
    async fn region_server_quota_snapshots(
        &self,
        server: &ServerName,
    ) -> Result<Vec<(TableName, proto::SpaceQuotaSnapshot)>>;

    /// Space quota enforcements active on a region server, one per table.
    async fn region_server_space_quota_enforcements(
        &self,
        server: &ServerName,
    ) -> Result<Vec<(TableName, proto::SpaceQuotaSnapshot)>>;
}

fn cluster(conn: &dyn Connection) -> Result<&dyn ClusterConnection> {
    conn.as_cluster().ok_or_else(|| {
        Error::UnsupportedConnection(
            "connection does not support cluster status calls".to_string(),
        )
    })
}

/// Table sizes as seen by the master.
///
/// The master reports one size per table; a repeated table keeps the last
/// reported size.
#[tracing::instrument(level = "trace", skip_all)]
pub async fn get_master_reported_table_sizes(
    conn: &dyn Connection,
) -> Result<HashMap<TableName, u64>> {
    let reported = cluster(conn)?.master_table_sizes().await?;
    Ok(reported
        .into_iter()
        .map(|reported| (reported.table, reported.size))
        .collect())
}

/// Space snapshots held by a single region server.
#[tracing::instrument(level = "trace", skip_all, fields(server = %server))]
pub async fn get_region_server_quota_snapshots(
    conn: &dyn Connection,
    server: &ServerName,
) -> Result<HashMap<TableName, SpaceQuotaSnapshot>> {
    let snapshots = cluster(conn)?
        .region_server_quota_snapshots(server)
        .await?;
    snapshots
        .iter()
        .map(|(table, snapshot)| {
            SpaceQuotaSnapshot::try_from(snapshot).map(|snapshot| (table.clone(), snapshot))
        })
        .collect()
}

/// Violation policies a single region server is enforcing.
///
/// # Errors
///
/// Returns [`Error::Rpc`] if an enforcement carries no violation policy.
#[tracing::instrument(level = "trace", skip_all, fields(server = %server))]
pub async fn get_region_server_quota_violations(
    conn: &dyn Connection,
    server: &ServerName,
) -> Result<HashMap<TableName, SpaceViolationPolicy>> {
    let enforcements = cluster(conn)?
        .region_server_space_quota_enforcements(server)
        .await?;
    let mut violations = HashMap::with_capacity(enforcements.len());
    for (table, snapshot) in &enforcements {
        let policy = SpaceQuotaSnapshot::try_from(snapshot)?
            .status()
            .policy()
            .ok_or_else(|| {
                Error::Rpc(format!("enforcement for {} has no violation policy", table))
            })?;
        violations.insert(table.clone(), policy);
    }
    Ok(violations)
}
