//! Sparkify event loader library.
//!
//! Aggregates raw event CSV files into one consolidated file and loads it
//! into three query-specific tables of a CQL keyspace.

pub mod cli_style;
pub mod config;
pub mod cql_persistence;
pub mod event_store;
pub mod events;
pub mod pipeline;
