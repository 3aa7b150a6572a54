//! Secondary indexes over table columns.
//!
//! Every index is a sled tree of entry keys `[encoded key][row_id:8]` with
//! empty values. The key encoding depends on the index kind:
//!
//! - [`IndexKind::Ordered`] uses an order-preserving encoding and supports
//!   exact lookup, "position at key or first greater" and forward key-ordered
//!   reads.
//! - [`IndexKind::ExactMatch`] uses a tagged encoding with no ordering
//!   guarantee and supports exact lookup only.

use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};
use shardshift_proto::Value;
use sled::Tree;

use super::exact_index::encode_tagged_into;
use super::ordered_index::encode_sortable_into;
use super::{Row, RowId};
use crate::error::Error;

/// Access capability of an index.
///
/// The set is closed: every consumer matches on it exhaustively, so a new
/// kind has to be handled everywhere before the crate builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum IndexKind {
    /// Tree-like: range positioning and key-ordered traversal.
    Ordered,
    /// Hash-like: exact-key lookup only.
    ExactMatch,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Ordered => write!(f, "ordered"),
            IndexKind::ExactMatch => write!(f, "exact-match"),
        }
    }
}

/// Declaration of an index on a table.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name, unique within its table.
    pub name: String,
    /// Access capability.
    pub kind: IndexKind,
    /// Column ordinals covered, in key order.
    pub columns: Vec<usize>,
    /// Whether two rows may share a key.
    pub unique: bool,
}

impl IndexDef {
    /// Declare a non-unique index.
    pub fn new(name: impl Into<String>, kind: IndexKind, columns: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            kind,
            columns,
            unique: false,
        }
    }

    /// Declare a non-unique ordered index on one column.
    pub fn ordered(name: impl Into<String>, column: usize) -> Self {
        Self::new(name, IndexKind::Ordered, vec![column])
    }

    /// Declare a non-unique exact-match index on one column.
    pub fn exact_match(name: impl Into<String>, column: usize) -> Self {
        Self::new(name, IndexKind::ExactMatch, vec![column])
    }

    /// Reject duplicate keys.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// A live index bound to its sled tree.
///
/// Cloning is cheap; clones share the underlying tree.
#[derive(Clone)]
pub struct TableIndex {
    def: IndexDef,
    tree: Tree,
}

impl TableIndex {
    pub(crate) fn new(def: IndexDef, tree: Tree) -> Self {
        Self { def, tree }
    }

    /// The index declaration.
    pub fn def(&self) -> &IndexDef {
        &self.def
    }

    /// Index name.
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Access capability.
    pub fn kind(&self) -> IndexKind {
        self.def.kind
    }

    /// Whether the index rejects duplicate keys.
    pub fn is_unique(&self) -> bool {
        self.def.unique
    }

    /// Column ordinals covered, in key order.
    pub fn columns(&self) -> &[usize] {
        &self.def.columns
    }

    /// Whether this index covers exactly the one column `column`.
    pub fn covers_single_column(&self, column: usize) -> bool {
        self.def.columns == [column]
    }

    /// Number of entries in the index.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn encode_value_into(&self, value: &Value, buf: &mut Vec<u8>) {
        match self.def.kind {
            IndexKind::Ordered => encode_sortable_into(value, buf),
            IndexKind::ExactMatch => encode_tagged_into(value, buf),
        }
    }

    /// Encoded key for a row, without the row id suffix.
    fn row_key(&self, row: &Row) -> Result<Vec<u8>, Error> {
        let mut key = Vec::new();
        for &column in &self.def.columns {
            let value = row.get(column).ok_or_else(|| {
                Error::SchemaMismatch(format!(
                    "index {} references missing column {}",
                    self.def.name, column
                ))
            })?;
            self.encode_value_into(value, &mut key);
        }
        Ok(key)
    }

    /// Encoded prefix for a lookup on the leading column.
    fn search_prefix(&self, key: &Value) -> Vec<u8> {
        let mut prefix = Vec::new();
        self.encode_value_into(key, &mut prefix);
        prefix
    }

    /// Check that inserting `row` would not violate uniqueness.
    pub(crate) fn check_insert(&self, row: &Row) -> Result<(), Error> {
        if !self.def.unique {
            return Ok(());
        }
        let key = self.row_key(row)?;
        if self.tree.scan_prefix(&key).next().transpose()?.is_some() {
            let shown: Vec<String> = self
                .def
                .columns
                .iter()
                .filter_map(|&c| row.get(c).map(ToString::to_string))
                .collect();
            return Err(Error::UniqueViolation {
                index: self.def.name.clone(),
                key: shown.join(", "),
            });
        }
        Ok(())
    }

    pub(crate) fn insert(&self, row: &Row, id: RowId) -> Result<(), Error> {
        let mut key = self.row_key(row)?;
        key.extend_from_slice(&id.encode());
        self.tree.insert(key, &[])?;
        Ok(())
    }

    pub(crate) fn remove(&self, row: &Row, id: RowId) -> Result<(), Error> {
        let mut key = self.row_key(row)?;
        key.extend_from_slice(&id.encode());
        self.tree.remove(key)?;
        Ok(())
    }

    /// Position exactly at `key` on the leading column.
    ///
    /// Returns the first matching row id, or `None` if the key is absent.
    /// Supported by every index kind.
    pub fn lookup(&self, key: &Value) -> Result<Option<RowId>, Error> {
        let prefix = self.search_prefix(key);
        match self.tree.scan_prefix(&prefix).next() {
            Some(entry) => {
                let (k, _) = entry?;
                RowId::from_suffix(&k).map(Some).ok_or(Error::InvalidKey)
            }
            None => Ok(None),
        }
    }

    /// Position at the first entry whose key is `>= key` and read forward in
    /// key order.
    ///
    /// Only ordered indexes support this; exact-match indexes return
    /// [`Error::UnsupportedScan`].
    pub fn seek(&self, key: &Value) -> Result<IndexCursor, Error> {
        match self.def.kind {
            IndexKind::Ordered => Ok(IndexCursor {
                inner: self.tree.range(self.search_prefix(key)..),
            }),
            kind => Err(Error::UnsupportedScan {
                index: self.def.name.clone(),
                kind: kind.to_string(),
            }),
        }
    }

    pub(crate) fn clear(&self) -> Result<(), Error> {
        self.tree.clear()?;
        Ok(())
    }
}

impl fmt::Debug for TableIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableIndex")
            .field("def", &self.def)
            .field("entries", &self.tree.len())
            .finish()
    }
}

/// Forward cursor over an ordered index, yielding row ids in key order.
///
/// Delete-safe: removing the entry (and row) just returned by the cursor does
/// not cause any other entry to be skipped or returned twice. The cursor
/// resumes strictly after the last key it yielded, and entries inserted
/// behind it are not revisited.
pub struct IndexCursor {
    inner: sled::Iter,
}

impl Iterator for IndexCursor {
    type Item = Result<RowId, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.inner.next()?;
        Some(
            entry
                .map_err(Error::from)
                .and_then(|(k, _)| RowId::from_suffix(&k).ok_or(Error::InvalidKey)),
        )
    }
}
