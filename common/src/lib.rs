//! Column-family store boundary.
//!
//! The quota table layer talks to a sorted store addressed by
//! `(row, family, qualifier)`. This crate defines that boundary as async
//! traits plus the request and result types that cross it, and ships an
//! in-memory implementation used by tests and local setups.

pub mod bytes;
pub mod serde;
pub mod storage;

pub use bytes::BytesRange;
pub use storage::in_memory::InMemoryTable;
pub use storage::{
    CellFilter, ColumnSelector, Get, Mutation, Row, RowIterator, Scan, StorageError,
    StorageResult, Table, TableRead,
};
