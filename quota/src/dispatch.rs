//! Classification of scanned quota rows and fan-out to per-scope callbacks.
//!
//! Each row is handled on its own. Namespace and table rows carry at most one
//! settings record; a user row can carry a global record plus one record per
//! table and per namespace, and each of those fires its own callback.

use std::collections::HashMap;

use common::Row;

use crate::error::{Error, Result};
use crate::model::{SpaceQuotaSnapshot, TableName};
use crate::proto::Quotas;
use crate::serde::key::{
    RowScope, UserQualifier, classify_user_qualifier, decode_row_key, is_namespace_row_key,
    is_table_row_key, is_user_row_key, namespace_from_row_key, table_from_row_key,
    user_from_row_key,
};
use crate::serde::record::{quotas_from_data, snapshot_from_data};
use crate::serde::{
    QUOTA_FAMILY_INFO, QUOTA_FAMILY_USAGE, QUOTA_QUALIFIER_POLICY, QUOTA_QUALIFIER_SETTINGS,
    QUOTA_TABLE_ROW_KEY_PREFIX,
};

type NamespaceCallback<'a> = Box<dyn FnMut(&str, Quotas) -> Result<()> + Send + 'a>;
type TableCallback<'a> = Box<dyn FnMut(&TableName, Quotas) -> Result<()> + Send + 'a>;
type UserCallback<'a> = Box<dyn FnMut(&str, &UserQualifier, Quotas) -> Result<()> + Send + 'a>;

/// Callbacks invoked for decoded settings records.
///
/// Unset callbacks are skipped; the record is still decoded, so corruption is
/// reported either way.
#[derive(Default)]
pub struct QuotaVisitor<'a> {
    namespace: Option<NamespaceCallback<'a>>,
    table: Option<TableCallback<'a>>,
    user: Option<UserCallback<'a>>,
}

impl<'a> QuotaVisitor<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_namespace(
        mut self,
        callback: impl FnMut(&str, Quotas) -> Result<()> + Send + 'a,
    ) -> Self {
        self.namespace = Some(Box::new(callback));
        self
    }

    pub fn on_table(
        mut self,
        callback: impl FnMut(&TableName, Quotas) -> Result<()> + Send + 'a,
    ) -> Self {
        self.table = Some(Box::new(callback));
        self
    }

    pub fn on_user(
        mut self,
        callback: impl FnMut(&str, &UserQualifier, Quotas) -> Result<()> + Send + 'a,
    ) -> Self {
        self.user = Some(Box::new(callback));
        self
    }

    fn visit_namespace(&mut self, namespace: &str, quotas: Quotas) -> Result<()> {
        match self.namespace.as_mut() {
            Some(callback) => callback(namespace, quotas),
            None => Ok(()),
        }
    }

    fn visit_table(&mut self, table: &TableName, quotas: Quotas) -> Result<()> {
        match self.table.as_mut() {
            Some(callback) => callback(table, quotas),
            None => Ok(()),
        }
    }

    fn visit_user(&mut self, user: &str, qualifier: &UserQualifier, quotas: Quotas) -> Result<()> {
        match self.user.as_mut() {
            Some(callback) => callback(user, qualifier, quotas),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for QuotaVisitor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaVisitor")
            .field("namespace", &self.namespace.is_some())
            .field("table", &self.table.is_some())
            .field("user", &self.user.is_some())
            .finish()
    }
}

/// What dispatching a single row did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowOutcome {
    Namespace { namespace: String, visited: bool },
    Table { table: TableName, visited: bool },
    User { user: String, records: usize },
    Unrecognized,
}

impl RowOutcome {
    /// Number of settings records decoded from the row.
    pub fn records(&self) -> usize {
        match self {
            RowOutcome::Namespace { visited, .. } | RowOutcome::Table { visited, .. } => {
                usize::from(*visited)
            }
            RowOutcome::User { records, .. } => *records,
            RowOutcome::Unrecognized => 0,
        }
    }
}

/// Dispatches a scanned row to the callback matching its scope.
///
/// Rows outside the quota key space are reported as
/// [`RowOutcome::Unrecognized`] with a warning rather than an error.
///
/// # Errors
///
/// Returns [`Error::CorruptRecord`] if a settings value fails to decode,
/// [`Error::MalformedKey`] if an identifier is not UTF-8, or whatever error
/// a callback returns.
pub fn parse_result(row: &Row, visitor: &mut QuotaVisitor<'_>) -> Result<RowOutcome> {
    let scope = match decode_row_key(row.key()) {
        Ok(scope) => scope,
        Err(Error::MalformedKey(reason)) if !has_known_prefix(row.key()) => {
            tracing::warn!(row = ?row.key(), %reason, "skipping unrecognized quota row");
            return Ok(RowOutcome::Unrecognized);
        }
        Err(e) => return Err(e),
    };
    match scope {
        RowScope::Namespace(namespace) => namespace_row(namespace, row, visitor),
        RowScope::Table(table) => table_row(table, row, visitor),
        RowScope::User(user) => user_row(user, row, visitor),
    }
}

fn has_known_prefix(key: &[u8]) -> bool {
    is_namespace_row_key(key) || is_table_row_key(key) || is_user_row_key(key)
}

fn global_settings(row: &Row) -> Result<Option<Quotas>> {
    row.value(QUOTA_FAMILY_INFO, QUOTA_QUALIFIER_SETTINGS)
        .map(|data| quotas_from_data(data))
        .transpose()
}

/// Decodes the `q:s` record of a namespace row.
pub fn parse_namespace_result(row: &Row, visitor: &mut QuotaVisitor<'_>) -> Result<RowOutcome> {
    namespace_row(namespace_from_row_key(row.key())?, row, visitor)
}

fn namespace_row(
    namespace: String,
    row: &Row,
    visitor: &mut QuotaVisitor<'_>,
) -> Result<RowOutcome> {
    let visited = match global_settings(row)? {
        Some(quotas) => {
            visitor.visit_namespace(&namespace, quotas)?;
            true
        }
        None => false,
    };
    Ok(RowOutcome::Namespace { namespace, visited })
}

/// Decodes the `q:s` record of a table row.
pub fn parse_table_result(row: &Row, visitor: &mut QuotaVisitor<'_>) -> Result<RowOutcome> {
    table_row(table_from_row_key(row.key())?, row, visitor)
}

fn table_row(table: TableName, row: &Row, visitor: &mut QuotaVisitor<'_>) -> Result<RowOutcome> {
    let visited = match global_settings(row)? {
        Some(quotas) => {
            visitor.visit_table(&table, quotas)?;
            true
        }
        None => false,
    };
    Ok(RowOutcome::Table { table, visited })
}

/// Decodes every settings record of a user row, in qualifier order.
///
/// Qualifiers that are not settings qualifiers are skipped.
pub fn parse_user_result(row: &Row, visitor: &mut QuotaVisitor<'_>) -> Result<RowOutcome> {
    user_row(user_from_row_key(row.key())?, row, visitor)
}

fn user_row(user: String, row: &Row, visitor: &mut QuotaVisitor<'_>) -> Result<RowOutcome> {
    let mut records = 0;
    if let Some(columns) = row.family(QUOTA_FAMILY_INFO) {
        for (qualifier, data) in columns {
            let Some(user_qualifier) = classify_user_qualifier(qualifier)? else {
                tracing::debug!(%user, ?qualifier, "skipping non-settings qualifier");
                continue;
            };
            let quotas = quotas_from_data(data)?;
            visitor.visit_user(&user, &user_qualifier, quotas)?;
            records += 1;
        }
    }
    Ok(RowOutcome::User { user, records })
}

/// Reads the space snapshot stored at `u:p` of a table row.
///
/// # Errors
///
/// Returns [`Error::IllegalInput`] if the row key is empty or not a table
/// row, if the row has no `u:p` cell, or if that cell does not decode.
pub fn extract_quota_snapshot(row: &Row) -> Result<(TableName, SpaceQuotaSnapshot)> {
    let key = row.key();
    if key.is_empty() {
        return Err(Error::IllegalInput("row key is empty".to_string()));
    }
    if !key.starts_with(QUOTA_TABLE_ROW_KEY_PREFIX) {
        return Err(Error::IllegalInput(format!("not a table row: {:?}", key)));
    }
    let table = table_from_row_key(key).map_err(|e| Error::IllegalInput(e.to_string()))?;
    let data = row
        .value(QUOTA_FAMILY_USAGE, QUOTA_QUALIFIER_POLICY)
        .ok_or_else(|| {
            Error::IllegalInput(format!(
                "row {:?} has no {}:{} cell",
                key,
                String::from_utf8_lossy(QUOTA_FAMILY_USAGE),
                String::from_utf8_lossy(QUOTA_QUALIFIER_POLICY)
            ))
        })?;
    let snapshot = snapshot_from_data(data)?;
    Ok((table, snapshot))
}

/// Extracts the snapshot of every row into `snapshots`, replacing earlier
/// entries for the same table.
pub fn extract_quota_snapshots<'r>(
    rows: impl IntoIterator<Item = &'r Row>,
    snapshots: &mut HashMap<TableName, SpaceQuotaSnapshot>,
) -> Result<()> {
    for row in rows {
        let (table, snapshot) = extract_quota_snapshot(row)?;
        snapshots.insert(table, snapshot);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;

    use super::*;
    use crate::model::{SpaceQuotaStatus, SpaceViolationPolicy};
    use crate::proto::{SpaceQuota, space_quota_with_policy};
    use crate::serde::key::{
        namespace_row_key, settings_qualifier_for_user_namespace,
        settings_qualifier_for_user_table, table_row_key, user_row_key,
    };
    use crate::serde::record::{quotas_to_data, snapshot_to_data};

    fn quotas(limit: u64) -> Quotas {
        Quotas {
            space: Some(SpaceQuota {
                soft_limit: Some(limit),
                ..space_quota_with_policy(SpaceViolationPolicy::NoInserts)
            }),
            ..Quotas::default()
        }
    }

    #[test]
    fn should_fan_out_user_row_into_one_callback_per_settings_qualifier() {
        // given
        let row = Row::new(user_row_key("bob"))
            .with_cell(QUOTA_FAMILY_INFO, QUOTA_QUALIFIER_SETTINGS, quotas_to_data(&quotas(1)))
            .with_cell(
                QUOTA_FAMILY_INFO,
                settings_qualifier_for_user_table(&TableName::new("tbl1")),
                quotas_to_data(&quotas(2)),
            )
            .with_cell(
                QUOTA_FAMILY_INFO,
                settings_qualifier_for_user_namespace("ns1"),
                quotas_to_data(&quotas(3)),
            );
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut visitor = QuotaVisitor::new().on_user(move |user, qualifier, quotas| {
            let limit = quotas.space.and_then(|s| s.soft_limit);
            sink.lock()
                .unwrap()
                .push((user.to_string(), qualifier.clone(), limit));
            Ok(())
        });

        // when
        let outcome = parse_result(&row, &mut visitor).unwrap();

        // then
        assert_eq!(outcome.records(), 3);
        let mut seen = seen.lock().unwrap().clone();
        seen.sort_by_key(|(_, _, limit)| *limit);
        assert_eq!(
            seen,
            vec![
                ("bob".to_string(), UserQualifier::Global, Some(1)),
                (
                    "bob".to_string(),
                    UserQualifier::PerTable(TableName::new("tbl1")),
                    Some(2)
                ),
                (
                    "bob".to_string(),
                    UserQualifier::PerNamespace("ns1".to_string()),
                    Some(3)
                ),
            ]
        );
    }

    #[test]
    fn should_skip_non_settings_qualifiers_in_user_row() {
        // given
        let row = Row::new(user_row_key("bob"))
            .with_cell(QUOTA_FAMILY_INFO, "x", "ignored")
            .with_cell(QUOTA_FAMILY_INFO, "s.", "ignored")
            .with_cell(QUOTA_FAMILY_INFO, QUOTA_QUALIFIER_SETTINGS, quotas_to_data(&quotas(1)));
        let mut calls = 0;
        let mut visitor = QuotaVisitor::new().on_user(|_, _, _| {
            calls += 1;
            Ok(())
        });

        // when
        let outcome = parse_user_result(&row, &mut visitor).unwrap();
        drop(visitor);

        // then
        assert_eq!(
            outcome,
            RowOutcome::User {
                user: "bob".to_string(),
                records: 1
            }
        );
        assert_eq!(calls, 1);
    }

    #[test]
    fn should_visit_table_and_namespace_rows() {
        // given
        let table_row = Row::new(table_row_key(&TableName::new("ns1:t1")))
            .with_cell(QUOTA_FAMILY_INFO, QUOTA_QUALIFIER_SETTINGS, quotas_to_data(&quotas(7)));
        let ns_row = Row::new(namespace_row_key("ns1"))
            .with_cell(QUOTA_FAMILY_INFO, QUOTA_QUALIFIER_SETTINGS, quotas_to_data(&quotas(8)));
        let mut tables = Vec::new();
        let mut namespaces = Vec::new();
        let mut visitor = QuotaVisitor::new()
            .on_table(|table, _| {
                tables.push(table.clone());
                Ok(())
            })
            .on_namespace(|ns, _| {
                namespaces.push(ns.to_string());
                Ok(())
            });

        // when
        parse_result(&table_row, &mut visitor).unwrap();
        parse_result(&ns_row, &mut visitor).unwrap();
        drop(visitor);

        // then
        assert_eq!(tables, vec![TableName::new("ns1:t1")]);
        assert_eq!(namespaces, vec!["ns1".to_string()]);
    }

    #[test]
    fn should_not_fire_callback_when_settings_absent() {
        // given
        let row = Row::new(table_row_key(&TableName::new("t1"))).with_cell(
            QUOTA_FAMILY_USAGE,
            QUOTA_QUALIFIER_POLICY,
            "whatever",
        );
        let mut calls = 0;
        let mut visitor = QuotaVisitor::new().on_table(|_, _| {
            calls += 1;
            Ok(())
        });

        // when
        let outcome = parse_result(&row, &mut visitor).unwrap();
        drop(visitor);

        // then
        assert_eq!(
            outcome,
            RowOutcome::Table {
                table: TableName::new("t1"),
                visited: false
            }
        );
        assert_eq!(calls, 0);
    }

    #[test]
    fn should_report_unrecognized_row_without_error() {
        // given
        let row = Row::new("x.something").with_cell(
            QUOTA_FAMILY_INFO,
            QUOTA_QUALIFIER_SETTINGS,
            quotas_to_data(&quotas(1)),
        );
        let mut calls = 0;
        let mut visitor = QuotaVisitor::new().on_table(|_, _| {
            calls += 1;
            Ok(())
        });

        // when
        let outcome = parse_result(&row, &mut visitor).unwrap();
        drop(visitor);

        // then
        assert_eq!(outcome, RowOutcome::Unrecognized);
        assert_eq!(calls, 0);
    }

    #[test]
    fn should_reject_namespace_row_passed_to_table_parser() {
        // given
        let row = Row::new(namespace_row_key("ns1"))
            .with_cell(QUOTA_FAMILY_INFO, QUOTA_QUALIFIER_SETTINGS, quotas_to_data(&quotas(1)));
        let mut calls = 0;
        let mut visitor = QuotaVisitor::new().on_table(|_, _| {
            calls += 1;
            Ok(())
        });

        // when
        let result = parse_table_result(&row, &mut visitor);
        drop(visitor);

        // then
        assert!(matches!(result, Err(Error::MalformedKey(_))));
        assert_eq!(calls, 0);
    }

    #[test]
    fn should_fail_on_corrupt_settings() {
        // given
        let mut data = quotas_to_data(&quotas(1)).to_vec();
        data[0] = b'X';
        let row = Row::new(namespace_row_key("ns1")).with_cell(
            QUOTA_FAMILY_INFO,
            QUOTA_QUALIFIER_SETTINGS,
            data,
        );

        // when
        let result = parse_result(&row, &mut QuotaVisitor::new());

        // then
        assert!(matches!(result, Err(Error::CorruptRecord(_))));
    }

    #[test]
    fn should_propagate_callback_error() {
        // given
        let row = Row::new(namespace_row_key("ns1"))
            .with_cell(QUOTA_FAMILY_INFO, QUOTA_QUALIFIER_SETTINGS, quotas_to_data(&quotas(1)));
        let mut visitor =
            QuotaVisitor::new().on_namespace(|_, _| Err(Error::Rpc("boom".to_string())));

        // when
        let result = parse_result(&row, &mut visitor);

        // then
        assert_eq!(result, Err(Error::Rpc("boom".to_string())));
    }

    #[test]
    fn should_extract_snapshot_from_table_row() {
        // given
        let snapshot = SpaceQuotaSnapshot::new(
            SpaceQuotaStatus::in_violation(SpaceViolationPolicy::NoWrites),
            2048,
            1024,
        );
        let row = Row::new(table_row_key(&TableName::new("ns1:t1"))).with_cell(
            QUOTA_FAMILY_USAGE,
            QUOTA_QUALIFIER_POLICY,
            snapshot_to_data(&snapshot),
        );

        // when
        let (table, extracted) = extract_quota_snapshot(&row).unwrap();

        // then
        assert_eq!(table, TableName::new("ns1:t1"));
        assert_eq!(extracted, snapshot);
    }

    #[test]
    fn should_reject_snapshot_rows_missing_key_or_cell() {
        let empty_key = Row::new(Bytes::new());
        let no_cell = Row::new(table_row_key(&TableName::new("t1")));
        let not_table = Row::new(namespace_row_key("ns1")).with_cell(
            QUOTA_FAMILY_USAGE,
            QUOTA_QUALIFIER_POLICY,
            "x",
        );

        for row in [empty_key, no_cell, not_table] {
            assert!(matches!(
                extract_quota_snapshot(&row),
                Err(Error::IllegalInput(_))
            ));
        }
    }

    #[test]
    fn should_collect_snapshots_by_table() {
        // given
        let rows: Vec<Row> = ["t1", "t2"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let snapshot =
                    SpaceQuotaSnapshot::new(SpaceQuotaStatus::not_in_violation(), i as u64, 100);
                Row::new(table_row_key(&TableName::new(*name))).with_cell(
                    QUOTA_FAMILY_USAGE,
                    QUOTA_QUALIFIER_POLICY,
                    snapshot_to_data(&snapshot),
                )
            })
            .collect();
        let mut snapshots = HashMap::new();

        // when
        extract_quota_snapshots(&rows, &mut snapshots).unwrap();

        // then
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[&TableName::new("t2")].usage(), 1);
    }
}
