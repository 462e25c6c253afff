//! In-memory column-family table.
//!
//! Cells live in a single sorted map keyed by
//! `terminated(row) ++ terminated(family) ++ qualifier`, so a range over the
//! map walks rows in key order with each row's cells contiguous.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};

use super::{Get, Mutation, Row, RowIterator, Scan, StorageError, StorageResult, Table, TableRead};
use crate::BytesRange;
use crate::serde::terminated_bytes::{self, prefix_range};

/// In-memory implementation of [`Table`] backed by a `BTreeMap`.
///
/// Useful for tests and single-process setups where durability is not
/// required. Cloning shares the underlying data.
#[derive(Clone, Default)]
pub struct InMemoryTable {
    cells: Arc<RwLock<BTreeMap<Bytes, Bytes>>>,
}

impl InMemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cells currently stored.
    pub fn cell_count(&self) -> StorageResult<usize> {
        Ok(self.read_cells()?.len())
    }

    fn read_cells(
        &self,
    ) -> StorageResult<std::sync::RwLockReadGuard<'_, BTreeMap<Bytes, Bytes>>> {
        self.cells
            .read()
            .map_err(|e| StorageError::Internal(format!("Failed to acquire read lock: {}", e)))
    }
}

fn cell_key(row: &[u8], family: &[u8], qualifier: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(row.len() + family.len() + qualifier.len() + 2);
    terminated_bytes::serialize(row, &mut buf);
    terminated_bytes::serialize(family, &mut buf);
    buf.extend_from_slice(qualifier);
    buf.freeze()
}

fn split_cell_key(key: &[u8]) -> StorageResult<(Bytes, Bytes, Bytes)> {
    let mut buf = key;
    let row = terminated_bytes::deserialize(&mut buf)
        .map_err(|e| StorageError::Internal(format!("corrupt cell key: {}", e)))?;
    let family = terminated_bytes::deserialize(&mut buf)
        .map_err(|e| StorageError::Internal(format!("corrupt cell key: {}", e)))?;
    Ok((row, family, Bytes::copy_from_slice(buf)))
}

/// Walks `range` and folds cells into rows, keeping only accepted cells.
fn collect_rows(
    cells: &BTreeMap<Bytes, Bytes>,
    range: BytesRange,
    accepts: impl Fn(&[u8], &[u8], &[u8]) -> bool,
) -> StorageResult<Vec<Row>> {
    let mut rows: Vec<Row> = Vec::new();
    let mut current: Option<Row> = None;

    for (key, value) in cells.range(range) {
        let (row_key, family, qualifier) = split_cell_key(key)?;
        if current.as_ref().is_some_and(|r| r.key() != &row_key) {
            rows.extend(current.take().filter(|r| !r.is_empty()));
        }
        if !accepts(&row_key, &family, &qualifier) {
            if current.is_none() {
                current = Some(Row::new(row_key));
            }
            continue;
        }
        current
            .get_or_insert_with(|| Row::new(row_key))
            .insert(family, qualifier, value.clone());
    }
    rows.extend(current.filter(|r| !r.is_empty()));

    Ok(rows)
}

#[async_trait]
impl TableRead for InMemoryTable {
    #[tracing::instrument(level = "trace", skip_all)]
    async fn get(&self, get: Get) -> StorageResult<Option<Row>> {
        let cells = self.read_cells()?;
        let range = BytesRange::prefix(terminated_bytes::serialize_to_bytes(get.row()));
        let rows = collect_rows(&cells, range, |_, family, qualifier| {
            get.selects(family, qualifier)
        })?;
        Ok(rows.into_iter().next())
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn scan_iter(&self, scan: Scan) -> StorageResult<Box<dyn RowIterator + Send + 'static>> {
        let cells = self.read_cells()?;
        let range = match scan.row_prefix() {
            Some(prefix) => prefix_range(prefix),
            None => BytesRange::unbounded(),
        };
        let rows = collect_rows(&cells, range, |row, family, qualifier| {
            scan.accepts(row, family, qualifier)
        })?;
        Ok(Box::new(InMemoryRowIterator {
            rows: rows.into_iter(),
        }))
    }
}

#[async_trait]
impl Table for InMemoryTable {
    #[tracing::instrument(level = "trace", skip_all)]
    async fn mutate(&self, mutations: Vec<Mutation>) -> StorageResult<()> {
        let mut cells = self
            .cells
            .write()
            .map_err(|e| StorageError::Internal(format!("Failed to acquire write lock: {}", e)))?;

        for mutation in mutations {
            match mutation {
                Mutation::Put {
                    row,
                    family,
                    qualifier,
                    value,
                } => {
                    cells.insert(cell_key(&row, &family, &qualifier), value);
                }
                Mutation::Delete {
                    row,
                    family,
                    qualifier,
                } => {
                    cells.remove(&cell_key(&row, &family, &qualifier));
                }
            }
        }
        Ok(())
    }
}

struct InMemoryRowIterator {
    rows: std::vec::IntoIter<Row>,
}

#[async_trait]
impl RowIterator for InMemoryRowIterator {
    async fn next(&mut self) -> StorageResult<Option<Row>> {
        Ok(self.rows.next())
    }
}
