//! End-to-end tests for writing, scanning and dispatching quota rows.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use common::{InMemoryTable, Mutation, Table};
use quota::proto::{
    Quotas, SpaceQuota, SpaceQuotaSnapshot as SnapshotMessage, Throttle, TimeUnit, TimedQuota,
};
use quota::serde::record::quotas_to_data;
use quota::status::{
    get_master_reported_table_sizes, get_region_server_quota_snapshots,
    get_region_server_quota_violations,
};
use quota::{
    ClusterConnection, Config, Error, LocalConnection, QuotaFilter, QuotaScope, QuotaTable,
    QuotaVisitor, Result, ServerName, SpaceQuotaSnapshot, SpaceQuotaStatus, SpaceViolationPolicy,
    TableName, TableSize, UserQualifier,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn throttle(limit: u64) -> Quotas {
    Quotas {
        throttle: Some(Throttle {
            req_num: Some(TimedQuota {
                time_unit: TimeUnit::Seconds as i32,
                soft_limit: Some(limit),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn space(limit: u64) -> Quotas {
    Quotas {
        space: Some(SpaceQuota {
            soft_limit: Some(limit),
            violation_policy: Some(quota::proto::SpaceViolationPolicy::NoInserts as i32),
            remove: None,
        }),
        ..Default::default()
    }
}

struct Fixture {
    table: QuotaTable,
    raw: InMemoryTable,
}

async fn setup() -> Fixture {
    init_tracing();
    let config = Config::default();
    let conn = config.open_connection();
    let table = QuotaTable::open(&conn, &config).expect("open quota table");
    let raw = conn
        .in_memory_table(&config.quota_table_name())
        .expect("raw quota table");

    let settings = [
        (QuotaScope::Namespace("ns1".to_string()), space(1_000)),
        (QuotaScope::Table(TableName::new("ns1:t1")), throttle(10)),
        (QuotaScope::UserGlobal("bob".to_string()), throttle(20)),
        (
            QuotaScope::UserForTable("bob".to_string(), TableName::new("t1")),
            throttle(30),
        ),
        (
            QuotaScope::UserForNamespace("bob".to_string(), "ns1".to_string()),
            throttle(40),
        ),
    ];
    for (scope, quotas) in &settings {
        table.put_quotas(scope, quotas).await.expect("put quotas");
    }

    Fixture { table, raw }
}

#[derive(Debug, Default)]
struct Seen {
    namespaces: Vec<String>,
    tables: Vec<TableName>,
    users: Vec<(String, UserQualifier)>,
}

fn recording_visitor(seen: &mut Seen) -> QuotaVisitor<'_> {
    let Seen {
        namespaces,
        tables,
        users,
    } = seen;
    QuotaVisitor::new()
        .on_namespace(move |namespace, _| {
            namespaces.push(namespace.to_string());
            Ok(())
        })
        .on_table(move |table, _| {
            tables.push(table.clone());
            Ok(())
        })
        .on_user(move |user, qualifier, _| {
            users.push((user.to_string(), qualifier.clone()));
            Ok(())
        })
}

#[tokio::test]
async fn should_dispatch_every_scope_on_unfiltered_scan() {
    // given
    let fixture = setup().await;
    let mut seen = Seen::default();

    // when
    let report = {
        let mut visitor = recording_visitor(&mut seen);
        fixture.table.scan_quotas(None, &mut visitor).await.unwrap()
    };

    // then
    assert_eq!(report.rows, 3);
    assert_eq!(report.records, 5);
    assert!(report.unrecognized.is_empty());
    assert!(report.errors.is_empty());
    assert_eq!(seen.namespaces, vec!["ns1".to_string()]);
    assert_eq!(seen.tables, vec![TableName::new("ns1:t1")]);
    assert_eq!(
        seen.users,
        vec![
            ("bob".to_string(), UserQualifier::Global),
            (
                "bob".to_string(),
                UserQualifier::PerNamespace("ns1".to_string())
            ),
            (
                "bob".to_string(),
                UserQualifier::PerTable(TableName::new("t1"))
            ),
        ]
    );
}

#[tokio::test]
async fn should_continue_past_unrecognized_and_corrupt_rows() {
    // given
    let fixture = setup().await;
    fixture
        .raw
        .mutate(vec![
            Mutation::put("a.other", "q", "s", quotas_to_data(&throttle(1))),
            Mutation::put("x.other", "q", "s", quotas_to_data(&throttle(1))),
            Mutation::put("t.broken", "q", "s", Bytes::from_static(b"garbage")),
        ])
        .await
        .unwrap();
    let mut seen = Seen::default();

    // when
    let report = {
        let mut visitor = recording_visitor(&mut seen);
        fixture.table.scan_quotas(None, &mut visitor).await.unwrap()
    };

    // then
    assert_eq!(report.rows, 6);
    assert_eq!(report.records, 5);
    assert_eq!(
        report.unrecognized,
        vec![
            Bytes::from_static(b"a.other"),
            Bytes::from_static(b"x.other")
        ]
    );
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].0, Bytes::from_static(b"t.broken"));
    assert!(matches!(report.errors[0].1, Error::CorruptRecord(_)));
    assert_eq!(seen.namespaces, vec!["ns1".to_string()]);
    assert_eq!(seen.tables, vec![TableName::new("ns1:t1")]);
    assert_eq!(seen.users.len(), 3);
}

#[tokio::test]
async fn should_scan_only_matching_user_table_settings() {
    // given
    let fixture = setup().await;
    let filter = QuotaFilter::new().with_user("bob").with_table("t1");
    let mut seen = Seen::default();

    // when
    let report = {
        let mut visitor = recording_visitor(&mut seen);
        fixture
            .table
            .scan_quotas(Some(&filter), &mut visitor)
            .await
            .unwrap()
    };

    // then
    assert_eq!(report.rows, 1);
    assert_eq!(
        seen.users,
        vec![(
            "bob".to_string(),
            UserQualifier::PerTable(TableName::new("t1"))
        )]
    );
    assert!(seen.namespaces.is_empty());
    assert!(seen.tables.is_empty());
}

#[tokio::test]
async fn should_scan_only_matching_namespaces() {
    // given
    let fixture = setup().await;
    let filter = QuotaFilter::new().with_namespace("ns.*");
    let mut seen = Seen::default();

    // when
    {
        let mut visitor = recording_visitor(&mut seen);
        fixture
            .table
            .scan_quotas(Some(&filter), &mut visitor)
            .await
            .unwrap();
    }

    // then
    assert_eq!(seen.namespaces, vec!["ns1".to_string()]);
    assert!(seen.tables.is_empty());
    assert!(seen.users.is_empty());
}

#[tokio::test]
async fn should_stop_scan_when_visitor_fails() {
    // given
    let fixture = setup().await;
    let mut visitor =
        QuotaVisitor::new().on_namespace(|_, _| Err(Error::IllegalInput("stop".to_string())));

    // when
    let result = fixture.table.scan_quotas(None, &mut visitor).await;

    // then
    assert_eq!(result, Err(Error::IllegalInput("stop".to_string())));
}

#[tokio::test]
async fn should_keep_snapshots_apart_from_settings() {
    // given
    let fixture = setup().await;
    let snapshot = SpaceQuotaSnapshot::new(
        SpaceQuotaStatus::in_violation(SpaceViolationPolicy::NoWrites),
        4096,
        1024,
    );

    // when
    fixture
        .table
        .write_space_snapshot(&TableName::new("ns1:t1"), &snapshot)
        .await
        .unwrap();

    // then
    let snapshots = fixture.table.get_quota_snapshots().await.unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[&TableName::new("ns1:t1")], snapshot);
    assert_eq!(
        fixture
            .table
            .get_table_quota(&TableName::new("ns1:t1"))
            .await
            .unwrap(),
        Some(throttle(10))
    );
}

struct FakeCluster;

#[async_trait]
impl ClusterConnection for FakeCluster {
    async fn master_table_sizes(&self) -> Result<Vec<TableSize>> {
        Ok(vec![
            TableSize {
                table: TableName::new("ns1:t1"),
                size: 150,
            },
            TableSize {
                table: TableName::new("ns1:t2"),
                size: 20,
            },
        ])
    }

    async fn region_server_quota_snapshots(
        &self,
        _server: &ServerName,
    ) -> Result<Vec<(TableName, SnapshotMessage)>> {
        let snapshot = SpaceQuotaSnapshot::new(SpaceQuotaStatus::not_in_violation(), 150, 1_000);
        Ok(vec![(
            TableName::new("ns1:t1"),
            SnapshotMessage::from(&snapshot),
        )])
    }

    async fn region_server_space_quota_enforcements(
        &self,
        _server: &ServerName,
    ) -> Result<Vec<(TableName, SnapshotMessage)>> {
        let snapshot = SpaceQuotaSnapshot::new(
            SpaceQuotaStatus::in_violation(SpaceViolationPolicy::Disable),
            1_500,
            1_000,
        );
        Ok(vec![(
            TableName::new("ns1:t1"),
            SnapshotMessage::from(&snapshot),
        )])
    }
}

#[tokio::test]
async fn should_query_cluster_status_through_capable_connection() {
    // given
    init_tracing();
    let conn = LocalConnection::new().with_cluster(Arc::new(FakeCluster));
    let server = ServerName::new("rs1", 16020, 42);

    // when
    let sizes = get_master_reported_table_sizes(&conn).await.unwrap();
    let snapshots = get_region_server_quota_snapshots(&conn, &server)
        .await
        .unwrap();
    let violations = get_region_server_quota_violations(&conn, &server)
        .await
        .unwrap();

    // then
    let table = TableName::new("ns1:t1");
    assert_eq!(sizes.len(), 2);
    assert_eq!(sizes[&table], 150);
    assert_eq!(snapshots[&table].usage(), 150);
    assert_eq!(violations[&table], SpaceViolationPolicy::Disable);
}

#[tokio::test]
async fn should_reject_status_calls_on_plain_connection() {
    let conn = Config::default().open_connection();

    let result = get_master_reported_table_sizes(&conn).await;

    assert!(matches!(result, Err(Error::UnsupportedConnection(_))));
}
