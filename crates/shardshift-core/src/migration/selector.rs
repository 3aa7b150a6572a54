//! Partition index selection.

use tracing::debug;

use crate::storage::{PersistentTable, TableIndex};

/// Find the index to drive extraction on `table`.
///
/// Returns the first index, in declaration order, that is unique and covers
/// exactly the partition column. Deterministic for a given table definition.
pub fn select_partition_index(table: &PersistentTable) -> Option<&TableIndex> {
    let partition_column = table.partition_column();
    let selected = table
        .indexes()
        .iter()
        .find(|index| index.is_unique() && index.covers_single_column(partition_column));

    match selected {
        Some(index) => debug!(
            table = table.name(),
            index = index.name(),
            kind = %index.kind(),
            "Selected partition index"
        ),
        None => debug!(table = table.name(), "No partition index"),
    }
    selected
}
