pub mod in_memory;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

/// Error type for storage operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Storage-related errors
    Storage(String),
    /// Internal errors
    Internal(String),
}

impl std::error::Error for StorageError {}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            StorageError::Storage(msg) => write!(f, "Storage error: {}", msg),
            StorageError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// All cells of a single row, grouped by family and then qualifier.
///
/// Families and qualifiers are kept sorted, matching the order a sorted
/// store delivers them in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Row {
    key: Bytes,
    families: BTreeMap<Bytes, BTreeMap<Bytes, Bytes>>,
}

impl Row {
    pub fn new(key: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            families: BTreeMap::new(),
        }
    }

    /// Adds a cell, returning the row for chaining.
    pub fn with_cell(
        mut self,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> Self {
        self.insert(family, qualifier, value);
        self
    }

    /// Adds or replaces a cell.
    pub fn insert(
        &mut self,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) {
        self.families
            .entry(family.into())
            .or_default()
            .insert(qualifier.into(), value.into());
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    /// Returns true when the row carries no cells.
    pub fn is_empty(&self) -> bool {
        self.families.values().all(BTreeMap::is_empty)
    }

    /// Returns the value stored at `family:qualifier`, if any.
    pub fn value(&self, family: &[u8], qualifier: &[u8]) -> Option<&Bytes> {
        self.families.get(family)?.get(qualifier)
    }

    /// Returns the qualifier → value map of a family, if the row has one.
    pub fn family(&self, family: &[u8]) -> Option<&BTreeMap<Bytes, Bytes>> {
        self.families.get(family)
    }

    /// Iterates `(family, qualifier, value)` in sorted order.
    pub fn cells(&self) -> impl Iterator<Item = (&Bytes, &Bytes, &Bytes)> {
        self.families
            .iter()
            .flat_map(|(family, columns)| columns.iter().map(move |(q, v)| (family, q, v)))
    }

    /// Number of cells in the row.
    pub fn len(&self) -> usize {
        self.families.values().map(BTreeMap::len).sum()
    }
}

/// Restricts a read to a whole family or a single column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnSelector {
    Family(Bytes),
    Column { family: Bytes, qualifier: Bytes },
}

impl ColumnSelector {
    pub fn selects(&self, family: &[u8], qualifier: &[u8]) -> bool {
        match self {
            ColumnSelector::Family(f) => f.as_ref() == family,
            ColumnSelector::Column {
                family: f,
                qualifier: q,
            } => f.as_ref() == family && q.as_ref() == qualifier,
        }
    }
}

/// An empty selector list selects every column.
fn columns_select(columns: &[ColumnSelector], family: &[u8], qualifier: &[u8]) -> bool {
    columns.is_empty() || columns.iter().any(|c| c.selects(family, qualifier))
}

/// Predicate evaluated by the store against every candidate cell of a scan.
///
/// Rows left without any matching cell are not returned.
pub trait CellFilter: std::fmt::Debug + Send + Sync {
    fn matches(&self, row: &[u8], family: &[u8], qualifier: &[u8]) -> bool;
}

/// Point read of a single row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Get {
    row: Bytes,
    columns: Vec<ColumnSelector>,
}

impl Get {
    pub fn new(row: impl Into<Bytes>) -> Self {
        Self {
            row: row.into(),
            columns: Vec::new(),
        }
    }

    pub fn add_family(mut self, family: impl Into<Bytes>) -> Self {
        self.columns.push(ColumnSelector::Family(family.into()));
        self
    }

    pub fn add_column(mut self, family: impl Into<Bytes>, qualifier: impl Into<Bytes>) -> Self {
        self.columns.push(ColumnSelector::Column {
            family: family.into(),
            qualifier: qualifier.into(),
        });
        self
    }

    pub fn row(&self) -> &Bytes {
        &self.row
    }

    pub fn columns(&self) -> &[ColumnSelector] {
        &self.columns
    }

    pub fn selects(&self, family: &[u8], qualifier: &[u8]) -> bool {
        columns_select(&self.columns, family, qualifier)
    }
}

/// Range read over rows in key order.
#[derive(Clone, Debug, Default)]
pub struct Scan {
    columns: Vec<ColumnSelector>,
    row_prefix: Option<Bytes>,
    filter: Option<Arc<dyn CellFilter>>,
}

impl Scan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_family(mut self, family: impl Into<Bytes>) -> Self {
        self.columns.push(ColumnSelector::Family(family.into()));
        self
    }

    pub fn add_column(mut self, family: impl Into<Bytes>, qualifier: impl Into<Bytes>) -> Self {
        self.columns.push(ColumnSelector::Column {
            family: family.into(),
            qualifier: qualifier.into(),
        });
        self
    }

    /// Limits the scan to rows whose key starts with `prefix`.
    pub fn with_row_prefix(mut self, prefix: impl Into<Bytes>) -> Self {
        self.row_prefix = Some(prefix.into());
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn CellFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn columns(&self) -> &[ColumnSelector] {
        &self.columns
    }

    pub fn row_prefix(&self) -> Option<&Bytes> {
        self.row_prefix.as_ref()
    }

    pub fn filter(&self) -> Option<&Arc<dyn CellFilter>> {
        self.filter.as_ref()
    }

    /// Returns true when a cell passes both column selection and the filter.
    pub fn accepts(&self, row: &[u8], family: &[u8], qualifier: &[u8]) -> bool {
        columns_select(&self.columns, family, qualifier)
            && self
                .filter
                .as_ref()
                .is_none_or(|f| f.matches(row, family, qualifier))
    }
}

/// A single cell write or delete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    Put {
        row: Bytes,
        family: Bytes,
        qualifier: Bytes,
        value: Bytes,
    },
    Delete {
        row: Bytes,
        family: Bytes,
        qualifier: Bytes,
    },
}

impl Mutation {
    pub fn put(
        row: impl Into<Bytes>,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> Self {
        Mutation::Put {
            row: row.into(),
            family: family.into(),
            qualifier: qualifier.into(),
            value: value.into(),
        }
    }

    pub fn delete(
        row: impl Into<Bytes>,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
    ) -> Self {
        Mutation::Delete {
            row: row.into(),
            family: family.into(),
            qualifier: qualifier.into(),
        }
    }
}

/// Iterator over scanned rows.
#[async_trait]
pub trait RowIterator {
    async fn next(&mut self) -> StorageResult<Option<Row>>;
}

/// Read operations of a column-family table.
#[async_trait]
pub trait TableRead: Send + Sync {
    /// Reads the selected columns of one row. Returns `None` when no selected
    /// cell exists.
    async fn get(&self, get: Get) -> StorageResult<Option<Row>>;

    /// Returns an iterator over matching rows in lexicographic row-key order.
    ///
    /// The returned iterator is owned and does not borrow from the table.
    async fn scan_iter(&self, scan: Scan) -> StorageResult<Box<dyn RowIterator + Send + 'static>>;

    /// Collects all matching rows into a Vec.
    #[tracing::instrument(level = "trace", skip_all)]
    async fn scan(&self, scan: Scan) -> StorageResult<Vec<Row>> {
        let mut iter = self.scan_iter(scan).await?;
        let mut rows = Vec::new();
        while let Some(row) = iter.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }
}

/// A readable and writable column-family table.
#[async_trait]
pub trait Table: TableRead {
    /// Applies the mutations atomically, in order.
    async fn mutate(&self, mutations: Vec<Mutation>) -> StorageResult<()>;
}
