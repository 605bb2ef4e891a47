//! CQL-backed event store, talking to Cassandra or ScyllaDB through the
//! `scylla` driver.

use super::models::{ColumnValue, Row, SelectQuery, WriteBatch};
use super::trait_def::{EventStore, StoreError};
use crate::cql_persistence::{Keyspace, Table};
use async_trait::async_trait;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::statement::batch::{Batch, BatchType};
use scylla::statement::prepared::PreparedStatement;
use scylla::value::{CqlValue, Row as CqlRow};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

pub struct ScyllaEventStore {
    keyspace: Keyspace,
    session: RwLock<Option<Session>>,
    prepared_inserts: Mutex<HashMap<&'static str, PreparedStatement>>,
}

impl ScyllaEventStore {
    /// Opens a session against `address` (`host:port`).
    pub async fn connect(
        address: &str,
        connect_timeout: Duration,
        keyspace: Keyspace,
    ) -> Result<Self, StoreError> {
        info!("Connecting to CQL store at {}...", address);
        let session = SessionBuilder::new()
            .known_node(address)
            .connection_timeout(connect_timeout)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("{}: {}", address, e)))?;
        info!("Connected to {}", address);

        Ok(Self {
            keyspace,
            session: RwLock::new(Some(session)),
            prepared_inserts: Mutex::new(HashMap::new()),
        })
    }

    async fn execute(&self, cql: String) -> Result<(), StoreError> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(StoreError::Closed)?;
        debug!("Executing {}", cql);
        session
            .query_unpaged(cql, ())
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    /// Prepared inserts for every table the batch writes to, keyed by table
    /// name. The cache lock is taken once per batch.
    async fn prepared_inserts_for(
        &self,
        session: &Session,
        batch: &WriteBatch,
    ) -> Result<HashMap<&'static str, PreparedStatement>, StoreError> {
        let mut cache = self.prepared_inserts.lock().await;
        let mut prepared_for_batch = HashMap::new();
        for table in distinct_tables(batch) {
            let prepared = match cache.get(table.name) {
                Some(prepared) => prepared.clone(),
                None => {
                    let prepared = session
                        .prepare(table.insert_statement(&self.keyspace.name))
                        .await
                        .map_err(|e| StoreError::Query(e.to_string()))?;
                    cache.insert(table.name, prepared.clone());
                    prepared
                }
            };
            prepared_for_batch.insert(table.name, prepared);
        }
        Ok(prepared_for_batch)
    }
}

/// Tables written by `batch`, in order of first appearance.
fn distinct_tables(batch: &WriteBatch) -> Vec<&'static Table> {
    let mut tables: Vec<&'static Table> = Vec::new();
    for insert in batch.iter() {
        if !tables.iter().any(|t| t.name == insert.table.name) {
            tables.push(insert.table);
        }
    }
    tables
}

fn to_cql_value(value: &ColumnValue) -> CqlValue {
    match value {
        ColumnValue::Int(value) => CqlValue::Int(*value),
        ColumnValue::Double(value) => CqlValue::Double(*value),
        ColumnValue::Text(value) => CqlValue::Text(value.clone()),
    }
}

fn from_cql_value(column: &str, value: Option<CqlValue>) -> Result<ColumnValue, StoreError> {
    match value {
        Some(CqlValue::Int(value)) => Ok(ColumnValue::Int(value)),
        Some(CqlValue::Double(value)) => Ok(ColumnValue::Double(value)),
        Some(CqlValue::Float(value)) => Ok(ColumnValue::Double(value as f64)),
        Some(CqlValue::Text(value)) | Some(CqlValue::Ascii(value)) => Ok(ColumnValue::Text(value)),
        Some(other) => Err(StoreError::UnsupportedValue {
            column: column.to_string(),
            detail: format!("{:?}", other),
        }),
        None => Err(StoreError::UnexpectedNull(column.to_string())),
    }
}

#[async_trait]
impl EventStore for ScyllaEventStore {
    async fn ensure_keyspace(&self) -> Result<(), StoreError> {
        self.execute(self.keyspace.create_statement()).await?;
        info!("Keyspace {} ready", self.keyspace.name);
        Ok(())
    }

    async fn ensure_table(&self, table: &'static Table) -> Result<(), StoreError> {
        self.execute(table.create_statement(&self.keyspace.name))
            .await
    }

    async fn submit_batch(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(StoreError::Closed)?;

        let prepared = self.prepared_inserts_for(session, batch).await?;
        let mut cql_batch = Batch::new(BatchType::Unlogged);
        let mut values: Vec<Vec<CqlValue>> = Vec::with_capacity(batch.len());
        for insert in batch.iter() {
            let statement = prepared
                .get(insert.table.name)
                .ok_or_else(|| StoreError::UnknownTable(insert.table.name.to_string()))?;
            cql_batch.append_statement(statement.clone());
            values.push(insert.values.iter().map(to_cql_value).collect());
        }

        session
            .batch(&cql_batch, values)
            .await
            .map_err(|e| StoreError::BatchRejected(e.to_string()))?;
        Ok(())
    }

    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, StoreError> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(StoreError::Closed)?;

        let values: Vec<CqlValue> = query
            .filters
            .iter()
            .map(|(_, value)| to_cql_value(value))
            .collect();
        let rows_result = session
            .query_unpaged(query.to_cql(&self.keyspace.name), values)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
            .into_rows_result()
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut rows = Vec::new();
        for row in rows_result
            .rows::<CqlRow>()
            .map_err(|e| StoreError::Query(e.to_string()))?
        {
            let row = row.map_err(|e| StoreError::Query(e.to_string()))?;
            let values = row
                .columns
                .into_iter()
                .zip(query.columns.iter())
                .map(|(value, column)| from_cql_value(column, value))
                .collect::<Result<Row, _>>()?;
            rows.push(values);
        }
        Ok(rows)
    }

    async fn drop_table(&self, table: &'static Table) -> Result<(), StoreError> {
        self.execute(table.drop_statement(&self.keyspace.name))
            .await
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.prepared_inserts.lock().await.clear();
        if self.session.write().await.take().is_some() {
            info!("CQL session closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::schema::batch_for;
    use crate::event_store::EVENT_TABLES;
    use crate::events::EventRecord;

    fn record(session_id: i32) -> EventRecord {
        EventRecord {
            artist_name: "Faithless".to_string(),
            user_first_name: "Ava".to_string(),
            item_in_session: 4,
            user_last_name: "Robinson".to_string(),
            song_length: 495.3073,
            session_id,
            song_title: "Music Matters".to_string(),
            user_id: 50,
        }
    }

    #[test]
    fn each_table_is_prepared_once_per_batch() {
        let records: Vec<EventRecord> = (0..100).map(record).collect();
        let batch = batch_for(EVENT_TABLES, &records).unwrap();
        assert_eq!(batch.len(), 300);

        let names: Vec<&str> = distinct_tables(&batch).iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["songs_by_session", "songs_by_user", "users_by_song"]);
    }

    #[test]
    fn values_convert_both_ways() {
        for value in [
            ColumnValue::Int(338),
            ColumnValue::Double(495.3073),
            ColumnValue::Text("Music Matters".to_string()),
        ] {
            let converted = from_cql_value("c", Some(to_cql_value(&value))).unwrap();
            assert_eq!(converted, value);
        }
    }

    #[test]
    fn null_cells_are_errors() {
        assert!(matches!(
            from_cql_value("song_title", None),
            Err(StoreError::UnexpectedNull(column)) if column == "song_title"
        ));
    }
}
