/*!
# Metadata store
A small relational stand-in for lineage records: three tables of JSON rows with generated ids.
Writes go through a `Transaction`; nothing is visible to other callers until `commit`, and a transaction
dropped without committing is rolled back.
*/

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::errors::{JobError, JobResult};
use crate::util::json_io::{load_json, save_json_atomic};

/// A row is a flat JSON object
pub type Row = serde_json::Map<String, serde_json::Value>;
/// Every row carries its generated id under this field
pub const ROW_ID_FIELD: &str = "rowid";

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, strum_macros::Display, strum_macros::EnumIter, strum_macros::EnumString)]
pub enum Table {
    #[strum(serialize = "readsets")]
    Readsets,
    #[strum(serialize = "analyses")]
    Analyses,
    #[strum(serialize = "output_files")]
    OutputFiles
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
struct TableData {
    /// Last id handed out; ids are never reused, even after a rollback
    last_id: u64,
    rows: BTreeMap<u64, Row>
}

type Tables = BTreeMap<String, TableData>;

/// Shared, thread-safe metadata store with optional JSON persistence
#[derive(Debug, Default)]
pub struct MetadataStore {
    tables: Mutex<Tables>,
    /// If set, every commit rewrites this file
    path: Option<PathBuf>
}

impl MetadataStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens a store backed by a JSON file, loading it if it already exists
    /// # Errors
    /// * if the file exists but cannot be parsed
    pub fn open(path: &Path) -> JobResult<Self> {
        let tables: Tables = if path.exists() {
            info!("Loading metadata from {path:?}");
            load_json(path)?
        } else {
            Default::default()
        };
        Ok(Self {
            tables: Mutex::new(tables),
            path: Some(path.to_path_buf())
        })
    }

    /// Starts a transaction; nothing it stages is visible until `commit`
    pub fn begin(&self) -> Transaction<'_> {
        Transaction {
            store: self,
            staged: vec![],
            committed: false
        }
    }

    /// Inserts a single row in its own transaction, returning the new id
    pub fn insert(&self, table: Table, row: Row) -> JobResult<u64> {
        let mut txn = self.begin();
        let id = txn.insert(table, row)?;
        txn.commit()?;
        Ok(id)
    }

    /// Returns all committed rows where `field == value`, ordered by id
    pub fn select(&self, table: Table, field: &str, value: &serde_json::Value) -> JobResult<Vec<Row>> {
        let tables = self.lock()?;
        Ok(tables.get(&table.to_string())
            .map(|t| t.rows.values()
                .filter(|r| r.get(field) == Some(value))
                .cloned()
                .collect())
            .unwrap_or_default())
    }

    /// Returns a committed row by id
    pub fn get(&self, table: Table, id: u64) -> JobResult<Option<Row>> {
        let tables = self.lock()?;
        Ok(tables.get(&table.to_string()).and_then(|t| t.rows.get(&id).cloned()))
    }

    /// Number of committed rows in a table
    pub fn count(&self, table: Table) -> JobResult<usize> {
        let tables = self.lock()?;
        Ok(tables.get(&table.to_string()).map(|t| t.rows.len()).unwrap_or(0))
    }

    fn lock(&self) -> JobResult<std::sync::MutexGuard<'_, Tables>> {
        self.tables.lock()
            .map_err(|_e| JobError::data("metadata store lock was poisoned by a failed writer"))
    }

    /// Reserves the next id for a table
    fn next_id(&self, table: Table) -> JobResult<u64> {
        let mut tables = self.lock()?;
        let data = tables.entry(table.to_string()).or_default();
        data.last_id += 1;
        Ok(data.last_id)
    }
}

/// Staged writes against a `MetadataStore`
pub struct Transaction<'a> {
    store: &'a MetadataStore,
    staged: Vec<(Table, u64, Row)>,
    committed: bool
}

impl Transaction<'_> {
    /// Stages a row and returns its id; the id is reserved immediately
    pub fn insert(&mut self, table: Table, mut row: Row) -> JobResult<u64> {
        let id = self.store.next_id(table)?;
        row.insert(ROW_ID_FIELD.to_string(), serde_json::Value::from(id));
        self.staged.push((table, id, row));
        Ok(id)
    }

    /// Like `MetadataStore::select`, but also sees rows staged in this transaction
    pub fn select(&self, table: Table, field: &str, value: &serde_json::Value) -> JobResult<Vec<Row>> {
        let mut rows = self.store.select(table, field, value)?;
        rows.extend(self.staged.iter()
            .filter(|(t, _id, r)| *t == table && r.get(field) == Some(value))
            .map(|(_t, _id, r)| r.clone()));
        Ok(rows)
    }

    /// Applies every staged row at once. If persisting fails, nothing is applied.
    pub fn commit(mut self) -> JobResult<()> {
        let mut tables = self.store.lock()?;
        let mut updated = tables.clone();
        for (table, id, row) in self.staged.drain(..) {
            updated.entry(table.to_string()).or_default().rows.insert(id, row);
        }
        if let Some(path) = self.store.path.as_ref() {
            save_json_atomic(&updated, path)?;
        }
        *tables = updated;
        self.committed = true;
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.staged.is_empty() {
            debug!("Rolling back {} staged metadata rows", self.staged.len());
        }
    }
}
