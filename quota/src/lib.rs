//! Quota table encoding.
//!
//! Quota settings for namespaces, tables and users, and space usage
//! snapshots for tables, are stored in a single column-family table. This
//! crate maps those entities onto row keys, qualifiers and cell values, and
//! maps scanned rows back into typed records.
//!
//! # Architecture
//!
//! - [`serde::key`] encodes and classifies row keys and qualifiers.
//! - [`serde::record`] wraps settings payloads in a magic-prefixed envelope.
//! - [`filter`] turns a [`QuotaFilter`] into an anchored scan predicate.
//! - [`dispatch`] classifies scanned rows and fans them out to callbacks.
//! - [`QuotaTable`] runs gets, scans and writes over a [`Connection`].
//! - [`status`] fetches usage and enforcement state from cluster services.
//!
//! # Example
//!
//! ```ignore
//! use quota::{Config, QuotaFilter, QuotaScope, QuotaTable, QuotaVisitor, TableName};
//!
//! let config = Config::default();
//! let conn = config.open_connection();
//! let table = QuotaTable::open(&conn, &config)?;
//!
//! table.put_quotas(&QuotaScope::Table(TableName::new("ns:t1")), &quotas).await?;
//!
//! let mut visitor = QuotaVisitor::new().on_table(|table, quotas| {
//!     println!("{}: {:?}", table, quotas);
//!     Ok(())
//! });
//! let report = table
//!     .scan_quotas(Some(&QuotaFilter::new().with_namespace("ns")), &mut visitor)
//!     .await?;
//! ```

mod config;
mod connection;
pub mod dispatch;
mod error;
pub mod filter;
mod model;
pub mod proto;
pub mod serde;
pub mod status;
mod table;

pub use config::{Config, DEFAULT_QUOTA_TABLE_NAME, StorageConfig};
pub use connection::{Connection, LocalConnection};
pub use dispatch::{QuotaVisitor, RowOutcome};
pub use error::{Error, Result};
pub use filter::{ScanFilter, make_filter};
pub use model::{
    DEFAULT_NAMESPACE, NAMESPACE_DELIM, QuotaFilter, QuotaScope, ServerName, SpaceQuotaSnapshot,
    SpaceQuotaStatus, SpaceViolationPolicy, TableName,
};
pub use crate::serde::key::{Qualifier, RowScope, UserQualifier};
pub use status::{ClusterConnection, TableSize};
pub use table::{
    QuotaTable, ScanReport, make_get_for_namespace_quotas, make_get_for_table_quotas,
    make_get_for_user_quotas, make_quota_violation_scan, make_scan, put_space_snapshot,
    scan_for_violations,
};
