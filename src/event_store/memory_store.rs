//! In-process event store.
//!
//! Mirrors the key semantics of a CQL table closely enough to run the whole
//! pipeline without a cluster: rows are unique on their primary key
//! (last write wins), returned in partition then clustering order, and
//! operations on tables that were never created fail like they would on the
//! real store. Individual batches can be made to fail for testing.

use super::models::{ColumnValue, Row, SelectQuery, WriteBatch};
use super::trait_def::{EventStore, StoreError};
use crate::cql_persistence::{CqlType, Keyspace, Table};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

struct MemoryTable {
    table: &'static Table,
    rows: BTreeMap<Row, Row>,
}

#[derive(Default)]
struct MemoryState {
    keyspace_created: bool,
    tables: HashMap<&'static str, MemoryTable>,
    batches_received: usize,
    closed: bool,
}

pub struct MemoryEventStore {
    keyspace: Keyspace,
    failing_batches: HashSet<usize>,
    state: Mutex<MemoryState>,
}

impl MemoryEventStore {
    pub fn new(keyspace: Keyspace) -> Self {
        Self {
            keyspace,
            failing_batches: HashSet::new(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Rejects the batches with the given zero-based submission indices.
    pub fn with_failing_batches(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.failing_batches = indices.into_iter().collect();
        self
    }

    /// Number of rows stored in `table`, or None if it does not exist.
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.state().tables.get(table).map(|t| t.rows.len())
    }

    pub fn batches_received(&self) -> usize {
        self.state().batches_received
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_state(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        let state = self.state();
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(state)
    }

    fn unknown_table(&self, table: &str) -> StoreError {
        StoreError::UnknownTable(format!("{}.{}", self.keyspace.name, table))
    }
}

fn primary_key(table: &Table, values: &Row) -> Row {
    table
        .primary_key_indices()
        .into_iter()
        .map(|i| values[i].clone())
        .collect()
}

fn check_insert(table: &Table, values: &Row) -> Result<(), String> {
    if values.len() != table.columns.len() {
        return Err(format!(
            "{} expects {} values, got {}",
            table.name,
            table.columns.len(),
            values.len()
        ));
    }
    for (column, value) in table.columns.iter().zip(values) {
        let matches = matches!(
            (column.cql_type, value),
            (CqlType::Int, ColumnValue::Int(_))
                | (CqlType::Double, ColumnValue::Double(_))
                | (CqlType::Text, ColumnValue::Text(_))
        );
        if !matches {
            return Err(format!(
                "{}.{} is {}, got {:?}",
                table.name,
                column.name,
                column.cql_type.as_cql(),
                value
            ));
        }
    }
    Ok(())
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn ensure_keyspace(&self) -> Result<(), StoreError> {
        let mut state = self.open_state()?;
        state.keyspace_created = true;
        Ok(())
    }

    async fn ensure_table(&self, table: &'static Table) -> Result<(), StoreError> {
        let mut state = self.open_state()?;
        if !state.keyspace_created {
            return Err(StoreError::Query(format!(
                "Keyspace {} does not exist",
                self.keyspace.name
            )));
        }
        state.tables.entry(table.name).or_insert_with(|| MemoryTable {
            table,
            rows: BTreeMap::new(),
        });
        Ok(())
    }

    async fn submit_batch(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        let mut state = self.open_state()?;
        let batch_index = state.batches_received;
        state.batches_received += 1;

        if self.failing_batches.contains(&batch_index) {
            return Err(StoreError::BatchRejected(format!(
                "batch {} rejected by test configuration",
                batch_index
            )));
        }

        // Validation failures reject the whole batch before anything is applied.
        for insert in batch.iter() {
            if !state.tables.contains_key(insert.table.name) {
                return Err(self.unknown_table(insert.table.name));
            }
            check_insert(insert.table, &insert.values).map_err(StoreError::BatchRejected)?;
        }

        for insert in batch.iter() {
            if let Some(memory_table) = state.tables.get_mut(insert.table.name) {
                let key = primary_key(memory_table.table, &insert.values);
                memory_table.rows.insert(key, insert.values.clone());
            }
        }
        debug!("Applied batch {} with {} inserts", batch_index, batch.len());
        Ok(())
    }

    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, StoreError> {
        let state = self.open_state()?;
        let memory_table = state
            .tables
            .get(query.table.name)
            .ok_or_else(|| self.unknown_table(query.table.name))?;
        let table = memory_table.table;

        let column_index = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| StoreError::Query(format!("Undefined column name {}", name)))
        };
        let projection = query
            .columns
            .iter()
            .map(|name| column_index(*name))
            .collect::<Result<Vec<_>, _>>()?;
        let filters = query
            .filters
            .iter()
            .map(|(name, value)| column_index(*name).map(|i| (i, value)))
            .collect::<Result<Vec<_>, _>>()?;

        // Rows are already ordered by primary key, which keeps clustering order
        // within each partition.
        Ok(memory_table
            .rows
            .values()
            .filter(|row| filters.iter().all(|(i, value)| &row[*i] == *value))
            .map(|row| projection.iter().map(|i| row[*i].clone()).collect::<Row>())
            .collect())
    }

    async fn drop_table(&self, table: &'static Table) -> Result<(), StoreError> {
        let mut state = self.open_state()?;
        state
            .tables
            .remove(table.name)
            .map(|_| ())
            .ok_or_else(|| self.unknown_table(table.name))
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.state().closed = true;
        Ok(())
    }
}
