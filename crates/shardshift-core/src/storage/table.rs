//! Persistent, insertion-ordered tables.

use std::fmt;
use std::sync::Arc;

use rkyv::{Archive, Deserialize, Serialize};
use sled::{Db, Tree};

use super::{IndexDef, Row, RowId, Schema, TableIndex};
use crate::error::Error;

/// Persisted definition of a table.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Row layout and partition column.
    pub schema: Schema,
    /// Indexes in declaration order.
    pub indexes: Vec<IndexDef>,
}

impl TableDef {
    /// Check the definition for internal consistency.
    pub fn check(&self) -> Result<(), Error> {
        self.schema.check()?;
        for (i, index) in self.indexes.iter().enumerate() {
            if index.columns.is_empty() {
                return Err(Error::InvalidData(format!(
                    "index {} covers no columns",
                    index.name
                )));
            }
            if let Some(&bad) = index
                .columns
                .iter()
                .find(|&&c| c >= self.schema.column_count())
            {
                return Err(Error::InvalidData(format!(
                    "index {} references column {} out of range",
                    index.name, bad
                )));
            }
            if self.indexes[..i].iter().any(|other| other.name == index.name) {
                return Err(Error::InvalidData(format!(
                    "duplicate index name {}",
                    index.name
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// Tree name holding the rows of a table.
pub(crate) fn rows_tree_name(table: &str) -> String {
    format!("table:{}:rows", table)
}

/// Tree name holding one index of a table.
pub(crate) fn index_tree_name(table: &str, index: &str) -> String {
    format!("table:{}:index:{}", table, index)
}

/// Handle to a table stored in a [`StorageEngine`](super::StorageEngine).
///
/// Rows are kept in insertion order, keyed by [`RowId`]. Every declared index
/// is maintained on insert and delete. Handles are cheap to clone and all
/// clones see the same data.
#[derive(Clone)]
pub struct PersistentTable {
    def: Arc<TableDef>,
    db: Db,
    engine_id: u64,
    rows: Tree,
    indexes: Arc<[TableIndex]>,
}

impl PersistentTable {
    pub(crate) fn open(db: &Db, engine_id: u64, def: TableDef) -> Result<Self, Error> {
        let rows = db.open_tree(rows_tree_name(&def.name))?;
        let indexes = def
            .indexes
            .iter()
            .map(|index| {
                let tree = db.open_tree(index_tree_name(&def.name, &index.name))?;
                Ok(TableIndex::new(index.clone(), tree))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self {
            def: Arc::new(def),
            db: db.clone(),
            engine_id,
            rows,
            indexes: indexes.into(),
        })
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Identity of the engine this handle was opened through.
    pub fn engine_id(&self) -> u64 {
        self.engine_id
    }

    /// Table definition.
    pub fn def(&self) -> &TableDef {
        &self.def
    }

    /// Row layout.
    pub fn schema(&self) -> &Schema {
        &self.def.schema
    }

    /// Ordinal of the partition column.
    pub fn partition_column(&self) -> usize {
        self.def.schema.partition_column
    }

    /// Indexes in declaration order.
    pub fn indexes(&self) -> &[TableIndex] {
        &self.indexes
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Insert a row, returning its new identity.
    ///
    /// Fails without writing anything if the row does not match the schema or
    /// a unique index already holds its key.
    pub fn insert(&self, row: &Row) -> Result<RowId, Error> {
        self.def.schema.validate(row)?;
        for index in self.indexes.iter() {
            index.check_insert(row)?;
        }

        let id = RowId(self.db.generate_id()?);
        let bytes = row.to_bytes()?;
        for index in self.indexes.iter() {
            index.insert(row, id)?;
        }
        self.rows.insert(id.encode(), bytes)?;
        Ok(id)
    }

    /// Fetch a row by identity.
    pub fn get(&self, id: RowId) -> Result<Option<Row>, Error> {
        match self.rows.get(id.encode())? {
            Some(bytes) => Ok(Some(Row::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete a row by identity, returning the removed row.
    pub fn delete(&self, id: RowId) -> Result<Row, Error> {
        let bytes = self.rows.remove(id.encode())?.ok_or(Error::NotFound)?;
        let row = Row::from_bytes(&bytes)?;
        for index in self.indexes.iter() {
            index.remove(&row, id)?;
        }
        Ok(row)
    }

    /// Forward scan over all rows in insertion order.
    pub fn scan(&self) -> TableCursor {
        TableCursor {
            inner: self.rows.iter(),
        }
    }

    /// Remove every row and index entry.
    pub(crate) fn clear(&self) -> Result<(), Error> {
        self.rows.clear()?;
        for index in self.indexes.iter() {
            index.clear()?;
        }
        Ok(())
    }
}

impl fmt::Debug for PersistentTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentTable")
            .field("name", &self.def.name)
            .field("rows", &self.rows.len())
            .field("indexes", &self.indexes)
            .finish()
    }
}

/// Forward cursor over a table's rows in insertion order.
///
/// Delete-safe: deleting the row just returned (through
/// [`PersistentTable::delete`]) does not cause any other row to be skipped or
/// returned twice.
pub struct TableCursor {
    inner: sled::Iter,
}

impl Iterator for TableCursor {
    type Item = Result<(RowId, Row), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.inner.next()?;
        Some(entry.map_err(Error::from).and_then(|(k, v)| {
            let id = RowId::decode(&k).ok_or(Error::InvalidKey)?;
            Ok((id, Row::from_bytes(&v)?))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ColumnDef;
    use shardshift_proto::{ScalarType, Value};

    fn test_table(indexes: Vec<IndexDef>) -> PersistentTable {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let def = TableDef {
            name: "orders".to_string(),
            schema: Schema::new(
                vec![
                    ColumnDef::new("order_id", ScalarType::Int64),
                    ColumnDef::new("item", ScalarType::String),
                ],
                0,
            ),
            indexes,
        };
        PersistentTable::open(&db, 0, def).unwrap()
    }

    fn row(key: i64) -> Row {
        Row::new(vec![Value::Int64(key), Value::String(format!("item-{}", key))])
    }

    fn keys(table: &PersistentTable) -> Vec<i64> {
        table
            .scan()
            .map(|r| r.unwrap().1.get(0).and_then(Value::as_i64).unwrap())
            .collect()
    }

    #[test]
    fn test_insert_scan_insertion_order() {
        let table = test_table(vec![]);
        for k in [3, 1, 2] {
            table.insert(&row(k)).unwrap();
        }
        assert_eq!(keys(&table), vec![3, 1, 2]);
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn test_insert_rejects_schema_mismatch() {
        let table = test_table(vec![]);
        let bad = Row::new(vec![Value::String("x".into()), Value::String("y".into())]);
        assert!(matches!(table.insert(&bad), Err(Error::SchemaMismatch(_))));
        assert!(table.is_empty());
    }

    #[test]
    fn test_insert_rejects_duplicate_unique_key() {
        let table = test_table(vec![IndexDef::ordered("pk", 0).unique()]);
        table.insert(&row(1)).unwrap();

        let err = table.insert(&row(1)).unwrap_err();
        assert!(matches!(err, Error::UniqueViolation { .. }));
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.indexes()[0].len(), 1);
    }

    #[test]
    fn test_delete_maintains_indexes() {
        let table = test_table(vec![
            IndexDef::ordered("pk", 0).unique(),
            IndexDef::exact_match("by_item", 1),
        ]);
        let id = table.insert(&row(5)).unwrap();
        table.insert(&row(6)).unwrap();

        let removed = table.delete(id).unwrap();
        assert_eq!(removed, row(5));
        assert_eq!(table.get(id).unwrap(), None);
        assert_eq!(table.indexes()[0].lookup(&Value::Int64(5)).unwrap(), None);
        assert_eq!(
            table.indexes()[1]
                .lookup(&Value::String("item-5".into()))
                .unwrap(),
            None
        );
        assert!(table.indexes()[0].lookup(&Value::Int64(6)).unwrap().is_some());
    }

    #[test]
    fn test_delete_missing() {
        let table = test_table(vec![]);
        assert!(matches!(table.delete(RowId(99)), Err(Error::NotFound)));
    }

    #[test]
    fn test_scan_delete_safe() {
        let table = test_table(vec![IndexDef::ordered("pk", 0).unique()]);
        for k in 0..100 {
            table.insert(&row(k)).unwrap();
        }

        let mut seen = Vec::new();
        for entry in table.scan() {
            let (id, row) = entry.unwrap();
            let key = row.get(0).and_then(Value::as_i64).unwrap();
            seen.push(key);
            if key % 3 == 0 {
                table.delete(id).unwrap();
            }
        }

        assert_eq!(seen, (0..100).collect::<Vec<_>>());
        assert_eq!(
            keys(&table),
            (0..100).filter(|k| k % 3 != 0).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_index_cursor_with_table_delete() {
        let table = test_table(vec![IndexDef::ordered("pk", 0).unique()]);
        for k in [9, 4, 7, 1, 6] {
            table.insert(&row(k)).unwrap();
        }

        let mut seen = Vec::new();
        for id in table.indexes()[0].seek(&Value::Int64(4)).unwrap() {
            let id = id.unwrap();
            let row = table.delete(id).unwrap();
            seen.push(row.get(0).and_then(Value::as_i64).unwrap());
        }

        assert_eq!(seen, vec![4, 6, 7, 9]);
        assert_eq!(keys(&table), vec![1]);
    }

    #[test]
    fn test_def_check() {
        let mut def = test_table(vec![]).def().clone();
        def.indexes = vec![IndexDef::ordered("bad", 5)];
        assert!(def.check().is_err());

        def.indexes = vec![IndexDef::ordered("a", 0), IndexDef::exact_match("a", 1)];
        assert!(def.check().is_err());

        def.indexes = vec![IndexDef::new("none", crate::storage::IndexKind::Ordered, vec![])];
        assert!(def.check().is_err());
    }

    #[test]
    fn test_def_roundtrip() {
        let table = test_table(vec![IndexDef::exact_match("pk", 0).unique()]);
        let bytes = table.def().to_bytes().unwrap();
        assert_eq!(&TableDef::from_bytes(&bytes).unwrap(), table.def());
    }
}
