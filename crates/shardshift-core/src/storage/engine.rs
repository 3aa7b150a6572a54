//! Storage engine: table catalog on top of sled.

use std::sync::atomic::{AtomicU64, Ordering};

use sled::{Db, Tree};
use tracing::debug;

use super::table::{index_tree_name, rows_tree_name};
use super::{IndexDef, PersistentTable, Schema, StorageConfig, TableDef};
use crate::error::Error;

/// Tree name for persisted table definitions.
const CATALOG_TREE: &str = "catalog:tables";

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// The storage engine wrapping sled.
///
/// Owns the table catalog: each table's definition is persisted in the
/// catalog tree, its rows and indexes in trees of their own.
pub struct StorageEngine {
    /// The underlying sled database.
    db: Db,

    /// Table name -> rkyv-encoded [`TableDef`].
    catalog_tree: Tree,

    /// Process-unique identity, stamped on every table handle.
    id: u64,
}

impl StorageEngine {
    /// Open or create a storage engine with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        let catalog_tree = db.open_tree(CATALOG_TREE)?;
        let id = NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed);
        Ok(Self {
            db,
            catalog_tree,
            id,
        })
    }

    /// Identity of this engine instance. Tables opened through it report the
    /// same value from [`PersistentTable::engine_id`].
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Check if the database was recovered from a previous crash.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    /// Create a table with its indexes, declared in lookup order.
    pub fn create_table(
        &self,
        name: &str,
        schema: Schema,
        indexes: Vec<IndexDef>,
    ) -> Result<PersistentTable, Error> {
        let def = TableDef {
            name: name.to_string(),
            schema,
            indexes,
        };
        def.check()?;

        let bytes = def.to_bytes()?;
        let swapped = self
            .catalog_tree
            .compare_and_swap(name.as_bytes(), None as Option<&[u8]>, Some(bytes))?;
        if swapped.is_err() {
            return Err(Error::TableExists(name.to_string()));
        }

        debug!(table = name, indexes = def.indexes.len(), "Created table");
        PersistentTable::open(&self.db, self.id, def)
    }

    /// Open an existing table by name.
    pub fn open_table(&self, name: &str) -> Result<PersistentTable, Error> {
        let bytes = self
            .catalog_tree
            .get(name.as_bytes())?
            .ok_or_else(|| Error::TableNotFound(name.to_string()))?;
        let def = TableDef::from_bytes(&bytes)?;
        PersistentTable::open(&self.db, self.id, def)
    }

    /// Whether a table with this name exists.
    pub fn has_table(&self, name: &str) -> Result<bool, Error> {
        Ok(self.catalog_tree.contains_key(name.as_bytes())?)
    }

    /// Drop a table, its rows and its indexes.
    pub fn drop_table(&self, name: &str) -> Result<(), Error> {
        let table = self.open_table(name)?;
        table.clear()?;

        self.db.drop_tree(rows_tree_name(name))?;
        for index in table.indexes() {
            self.db.drop_tree(index_tree_name(name, index.name()))?;
        }
        self.catalog_tree.remove(name.as_bytes())?;

        debug!(table = name, "Dropped table");
        Ok(())
    }

    /// Names of all tables, sorted.
    pub fn table_names(&self) -> Result<Vec<String>, Error> {
        self.catalog_tree
            .iter()
            .keys()
            .map(|key| {
                let key = key?;
                String::from_utf8(key.to_vec()).map_err(|_| Error::InvalidKey)
            })
            .collect()
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }
}
