//! Reads and writes against the quota table.
//!
//! The free functions build the requests; [`QuotaTable`] runs them against a
//! [`Table`] and feeds the results through the record codec and dispatcher.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use common::{Get, Mutation, Row, Scan, Table};

use crate::config::Config;
use crate::connection::Connection;
use crate::dispatch::{
    QuotaVisitor, RowOutcome, extract_quota_snapshot, extract_quota_snapshots, parse_result,
    parse_user_result,
};
use crate::error::{Error, Result};
use crate::filter::make_filter;
use crate::model::{QuotaFilter, QuotaScope, SpaceQuotaSnapshot, TableName};
use crate::proto::Quotas;
use crate::serde::key::{
    UserQualifier, encode_qualifier, namespace_row_key, settings_qualifier_for_user_namespace,
    settings_qualifier_for_user_table, table_row_key, user_row_key,
};
use crate::serde::record::{is_empty_quota, quotas_from_data, quotas_to_data, snapshot_to_data};
use crate::serde::{
    QUOTA_FAMILY_INFO, QUOTA_FAMILY_USAGE, QUOTA_QUALIFIER_POLICY, QUOTA_QUALIFIER_SETTINGS,
    QUOTA_TABLE_ROW_KEY_PREFIX,
};

/// Scan over the settings family, restricted by `filter` when it is not null.
pub fn make_scan(filter: Option<&QuotaFilter>) -> Result<Scan> {
    let scan = Scan::new().add_family(QUOTA_FAMILY_INFO);
    match filter {
        Some(filter) if !filter.is_null() => Ok(scan.with_filter(Arc::new(make_filter(filter)?))),
        _ => Ok(scan),
    }
}

/// Scan over the space snapshots of every table row.
pub fn make_quota_violation_scan() -> Scan {
    Scan::new()
        .add_column(QUOTA_FAMILY_USAGE, QUOTA_QUALIFIER_POLICY)
        .with_row_prefix(QUOTA_TABLE_ROW_KEY_PREFIX)
}

/// Scan over every `u:p` cell regardless of row scope.
pub fn scan_for_violations() -> Scan {
    Scan::new().add_column(QUOTA_FAMILY_USAGE, QUOTA_QUALIFIER_POLICY)
}

pub fn make_get_for_table_quotas(table: &TableName) -> Get {
    Get::new(table_row_key(table)).add_family(QUOTA_FAMILY_INFO)
}

pub fn make_get_for_namespace_quotas(namespace: &str) -> Get {
    Get::new(namespace_row_key(namespace)).add_family(QUOTA_FAMILY_INFO)
}

/// Get for a user's global settings plus the given per-table and
/// per-namespace settings.
pub fn make_get_for_user_quotas(user: &str, tables: &[TableName], namespaces: &[String]) -> Get {
    let get = Get::new(user_row_key(user)).add_column(QUOTA_FAMILY_INFO, QUOTA_QUALIFIER_SETTINGS);
    let get = tables.iter().fold(get, |get, table| {
        get.add_column(QUOTA_FAMILY_INFO, settings_qualifier_for_user_table(table))
    });
    namespaces.iter().fold(get, |get, namespace| {
        get.add_column(
            QUOTA_FAMILY_INFO,
            settings_qualifier_for_user_namespace(namespace),
        )
    })
}

fn make_get_for_scope(scope: &QuotaScope) -> Get {
    let qualifier = scope.settings_qualifier();
    Get::new(scope.row_key()).add_column(qualifier.family(), encode_qualifier(&qualifier))
}

/// Put of a table's space snapshot into `u:p`.
pub fn put_space_snapshot(table: &TableName, snapshot: &SpaceQuotaSnapshot) -> Mutation {
    Mutation::put(
        table_row_key(table),
        QUOTA_FAMILY_USAGE,
        QUOTA_QUALIFIER_POLICY,
        snapshot_to_data(snapshot),
    )
}

/// Summary of a settings scan.
#[derive(Debug, Default, PartialEq)]
pub struct ScanReport {
    /// Rows delivered by the store.
    pub rows: usize,
    /// Settings records decoded and handed to the visitor.
    pub records: usize,
    /// Keys of rows outside the quota key space.
    pub unrecognized: Vec<Bytes>,
    /// Rows that could not be decoded, with the reason.
    pub errors: Vec<(Bytes, Error)>,
}

/// Handle to the quota table.
#[derive(Clone)]
pub struct QuotaTable {
    table: Arc<dyn Table>,
}

impl QuotaTable {
    pub fn new(table: Arc<dyn Table>) -> Self {
        Self { table }
    }

    /// Opens the configured quota table on `conn`.
    pub fn open(conn: &dyn Connection, config: &Config) -> Result<Self> {
        Ok(Self::new(conn.table(&config.quota_table_name())?))
    }

    async fn get_settings(&self, get: Get) -> Result<Option<Quotas>> {
        let Some(row) = self.table.get(get).await? else {
            return Ok(None);
        };
        Self::settings_in_row(&row, QUOTA_QUALIFIER_SETTINGS)
    }

    fn settings_in_row(row: &Row, qualifier: &[u8]) -> Result<Option<Quotas>> {
        row.value(QUOTA_FAMILY_INFO, qualifier)
            .map(|data| quotas_from_data(data))
            .transpose()
    }

    #[tracing::instrument(level = "trace", skip_all, fields(table = %table))]
    pub async fn get_table_quota(&self, table: &TableName) -> Result<Option<Quotas>> {
        self.get_settings(make_get_for_table_quotas(table)).await
    }

    #[tracing::instrument(level = "trace", skip_all, fields(namespace = %namespace))]
    pub async fn get_namespace_quota(&self, namespace: &str) -> Result<Option<Quotas>> {
        self.get_settings(make_get_for_namespace_quotas(namespace))
            .await
    }

    pub async fn get_user_quota(&self, user: &str) -> Result<Option<Quotas>> {
        self.get_scope_quota(&QuotaScope::UserGlobal(user.to_string()))
            .await
    }

    pub async fn get_user_table_quota(
        &self,
        user: &str,
        table: &TableName,
    ) -> Result<Option<Quotas>> {
        self.get_scope_quota(&QuotaScope::UserForTable(user.to_string(), table.clone()))
            .await
    }

    pub async fn get_user_namespace_quota(
        &self,
        user: &str,
        namespace: &str,
    ) -> Result<Option<Quotas>> {
        self.get_scope_quota(&QuotaScope::UserForNamespace(
            user.to_string(),
            namespace.to_string(),
        ))
        .await
    }

    /// Reads the settings stored for any scope.
    #[tracing::instrument(level = "trace", skip_all)]
    pub async fn get_scope_quota(&self, scope: &QuotaScope) -> Result<Option<Quotas>> {
        let get = make_get_for_scope(scope);
        let Some(row) = self.table.get(get).await? else {
            return Ok(None);
        };
        let qualifier = encode_qualifier(&scope.settings_qualifier());
        Self::settings_in_row(&row, &qualifier)
    }

    /// Reads a user's global settings together with the requested per-table
    /// and per-namespace settings, in qualifier order.
    #[tracing::instrument(level = "trace", skip_all, fields(user = %user))]
    pub async fn get_user_quotas(
        &self,
        user: &str,
        tables: &[TableName],
        namespaces: &[String],
    ) -> Result<Vec<(UserQualifier, Quotas)>> {
        let get = make_get_for_user_quotas(user, tables, namespaces);
        let Some(row) = self.table.get(get).await? else {
            return Ok(Vec::new());
        };
        let mut found = Vec::new();
        let mut visitor = QuotaVisitor::new().on_user(|_, qualifier, quotas| {
            found.push((qualifier.clone(), quotas));
            Ok(())
        });
        parse_user_result(&row, &mut visitor)?;
        drop(visitor);
        Ok(found)
    }

    /// Scans settings rows and dispatches each one to `visitor`.
    ///
    /// Rows that fail to decode are recorded in the report and the scan moves
    /// on. Errors returned by the visitor or the store end the scan.
    #[tracing::instrument(level = "trace", skip_all)]
    pub async fn scan_quotas(
        &self,
        filter: Option<&QuotaFilter>,
        visitor: &mut QuotaVisitor<'_>,
    ) -> Result<ScanReport> {
        let scan = make_scan(filter)?;
        let mut iter = self.table.scan_iter(scan).await?;
        let mut report = ScanReport::default();
        while let Some(row) = iter.next().await? {
            report.rows += 1;
            match parse_result(&row, visitor) {
                Ok(RowOutcome::Unrecognized) => report.unrecognized.push(row.key().clone()),
                Ok(outcome) => report.records += outcome.records(),
                Err(e @ (Error::CorruptRecord(_) | Error::MalformedKey(_))) => {
                    tracing::warn!(row = ?row.key(), error = %e, "skipping undecodable quota row");
                    report.errors.push((row.key().clone(), e));
                }
                Err(e) => return Err(e),
            }
        }
        tracing::debug!(
            rows = report.rows,
            records = report.records,
            unrecognized = report.unrecognized.len(),
            errors = report.errors.len(),
            "quota scan complete"
        );
        Ok(report)
    }

    /// Stores `quotas` for `scope`, or removes the cell when the settings are
    /// empty.
    #[tracing::instrument(level = "trace", skip_all)]
    pub async fn put_quotas(&self, scope: &QuotaScope, quotas: &Quotas) -> Result<()> {
        let qualifier = scope.settings_qualifier();
        let mutation = if is_empty_quota(quotas) {
            Mutation::delete(
                scope.row_key(),
                qualifier.family(),
                encode_qualifier(&qualifier),
            )
        } else {
            Mutation::put(
                scope.row_key(),
                qualifier.family(),
                encode_qualifier(&qualifier),
                quotas_to_data(quotas),
            )
        };
        self.table.mutate(vec![mutation]).await?;
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip_all)]
    pub async fn delete_quotas(&self, scope: &QuotaScope) -> Result<()> {
        let qualifier = scope.settings_qualifier();
        self.table
            .mutate(vec![Mutation::delete(
                scope.row_key(),
                qualifier.family(),
                encode_qualifier(&qualifier),
            )])
            .await?;
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip_all, fields(table = %table))]
    pub async fn write_space_snapshot(
        &self,
        table: &TableName,
        snapshot: &SpaceQuotaSnapshot,
    ) -> Result<()> {
        self.table
            .mutate(vec![put_space_snapshot(table, snapshot)])
            .await?;
        Ok(())
    }

    /// Reads the space snapshot of one table, if one has been written.
    #[tracing::instrument(level = "trace", skip_all, fields(table = %table))]
    pub async fn get_current_snapshot(
        &self,
        table: &TableName,
    ) -> Result<Option<SpaceQuotaSnapshot>> {
        let get =
            Get::new(table_row_key(table)).add_column(QUOTA_FAMILY_USAGE, QUOTA_QUALIFIER_POLICY);
        match self.table.get(get).await? {
            Some(row) => Ok(Some(extract_quota_snapshot(&row)?.1)),
            None => Ok(None),
        }
    }

    /// Reads the space snapshot of every table.
    #[tracing::instrument(level = "trace", skip_all)]
    pub async fn get_quota_snapshots(&self) -> Result<HashMap<TableName, SpaceQuotaSnapshot>> {
        let rows = self.table.scan(make_quota_violation_scan()).await?;
        let mut snapshots = HashMap::with_capacity(rows.len());
        extract_quota_snapshots(&rows, &mut snapshots)?;
        Ok(snapshots)
    }
}

impl std::fmt::Debug for QuotaTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaTable").finish_non_exhaustive()
    }
}
