mod memory_store;
mod models;
pub mod schema;
mod scylla_store;
mod trait_def;

pub use memory_store::MemoryEventStore;
pub use models::{ColumnValue, Insert, Row, SelectQuery, WriteBatch};
pub use schema::{EVENT_TABLES, SONGS_BY_SESSION, SONGS_BY_USER, USERS_BY_SONG};
pub use scylla_store::ScyllaEventStore;
#[cfg(any(test, feature = "mock"))]
pub use trait_def::MockEventStore;
pub use trait_def::{EventStore, StoreError};
