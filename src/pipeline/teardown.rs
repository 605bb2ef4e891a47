use super::report::Outcome;
use crate::cql_persistence::Table;
use crate::event_store::EventStore;
use tracing::{error, info};

/// Drops every table independently; a failure on one does not stop the others.
pub async fn drop_tables(store: &dyn EventStore, tables: &[&'static Table]) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(tables.len());
    for &table in tables {
        let result = store.drop_table(table).await;
        match &result {
            Ok(()) => info!("Dropped table {}", table.name),
            Err(e) => error!("Failed to drop table {}: {}", table.name, e),
        }
        outcomes.push(Outcome::from_result(table.name, result));
    }
    outcomes
}
