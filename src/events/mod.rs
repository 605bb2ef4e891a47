mod aggregator;
mod models;

pub use aggregator::{AggregateError, AggregateStats, Aggregator};
pub use models::{EventRecord, RawEventRecord, CONSOLIDATED_HEADER, RAW_COLUMN_COUNT};
