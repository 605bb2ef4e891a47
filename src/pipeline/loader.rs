//! Windowed batch loading of the consolidated event file.

use crate::cql_persistence::Table;
use crate::event_store::schema::batch_for;
use crate::event_store::EventStore;
use crate::events::{EventRecord, CONSOLIDATED_HEADER};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Batch size must be greater than zero")]
    InvalidBatchSize,

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path:?} has header {found:?}, expected {expected:?}")]
    UnexpectedHeader {
        path: PathBuf,
        found: Vec<String>,
        expected: Vec<String>,
    },

    #[error("Malformed record at {path:?} line {line}: {source}")]
    MalformedRecord {
        path: PathBuf,
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid record at {path:?} line {line}: {reason}")]
    InvalidRecord {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("Table {table} has column {column} with no matching event field")]
    UnmappedColumn {
        table: &'static str,
        column: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFailure {
    pub window: usize,
    pub records: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub records_read: usize,
    pub batches_submitted: usize,
    pub batches_failed: usize,
    /// Counted whether or not the batch carrying them succeeded.
    pub inserts_attempted: usize,
    pub failed_windows: Vec<WindowFailure>,
}

pub struct BatchLoader<'a> {
    store: &'a dyn EventStore,
    tables: &'a [&'static Table],
    batch_size: usize,
}

impl<'a> BatchLoader<'a> {
    pub fn new(
        store: &'a dyn EventStore,
        tables: &'a [&'static Table],
        batch_size: usize,
    ) -> Result<Self, LoadError> {
        if batch_size == 0 {
            return Err(LoadError::InvalidBatchSize);
        }
        Ok(Self {
            store,
            tables,
            batch_size,
        })
    }

    /// Streams `path` window by window, submitting one batch per window.
    ///
    /// A failed submission is logged and counted and the next window is loaded
    /// anyway. Only an unreadable or malformed file stops the load.
    pub async fn load_file(&self, path: &Path) -> Result<LoadStats, LoadError> {
        let read_err = |source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::Reader::from_path(path).map_err(read_err)?;
        let headers = reader.headers().map_err(read_err)?.clone();
        if headers.iter().ne(CONSOLIDATED_HEADER) {
            return Err(LoadError::UnexpectedHeader {
                path: path.to_path_buf(),
                found: headers.iter().map(String::from).collect(),
                expected: CONSOLIDATED_HEADER.iter().map(|h| h.to_string()).collect(),
            });
        }

        info!(
            "Loading {:?} into {} tables, {} records per batch",
            path,
            self.tables.len(),
            self.batch_size
        );

        let mut stats = LoadStats::default();
        let mut window = Vec::with_capacity(self.batch_size);
        for result in reader.records() {
            let record = result.map_err(read_err)?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let event: EventRecord =
                record
                    .deserialize(Some(&headers))
                    .map_err(|source| LoadError::MalformedRecord {
                        path: path.to_path_buf(),
                        line,
                        source,
                    })?;
            event
                .validate()
                .map_err(|reason| LoadError::InvalidRecord {
                    path: path.to_path_buf(),
                    line,
                    reason,
                })?;

            stats.records_read += 1;
            window.push(event);
            if window.len() == self.batch_size {
                self.submit_window(&window, &mut stats).await?;
                window.clear();
            }
        }
        if !window.is_empty() {
            self.submit_window(&window, &mut stats).await?;
        }

        info!(
            "Loaded {} records: {} batches submitted, {} failed, {} inserts attempted",
            stats.records_read, stats.batches_submitted, stats.batches_failed, stats.inserts_attempted
        );
        Ok(stats)
    }

    async fn submit_window(
        &self,
        records: &[EventRecord],
        stats: &mut LoadStats,
    ) -> Result<(), LoadError> {
        let window = stats.batches_submitted;
        let batch = batch_for(self.tables, records)
            .map_err(|(table, column)| LoadError::UnmappedColumn { table, column })?;

        stats.batches_submitted += 1;
        stats.inserts_attempted += batch.len();
        match self.store.submit_batch(&batch).await {
            Ok(()) => debug!("Window {}: {} inserts applied", window, batch.len()),
            Err(e) => {
                error!("Window {} with {} records failed: {}", window, records.len(), e);
                stats.batches_failed += 1;
                stats.failed_windows.push(WindowFailure {
                    window,
                    records: records.len(),
                    error: e.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cql_persistence::Keyspace;
    use crate::event_store::{MemoryEventStore, MockEventStore, StoreError, EVENT_TABLES};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const HEADER: &str = "\"artist_name\",\"user_first_name\",\"item_in_session\",\"user_last_name\",\"song_length\",\"session_id\",\"song_title\",\"user_id\"";

    fn consolidated_file(dir: &TempDir, records: usize) -> PathBuf {
        let mut content = format!("{}\n", HEADER);
        for i in 0..records {
            content.push_str(&format!(
                "\"Artist {i}\",\"First\",\"{i}\",\"Last\",\"{}.5\",\"{}\",\"Song {i}\",\"{}\"\n",
                100 + i,
                i / 10,
                i % 7
            ));
        }
        let path = dir.path().join("event_datafile_new.csv");
        fs::write(&path, content).unwrap();
        path
    }

    async fn ready_store() -> MemoryEventStore {
        let store = MemoryEventStore::new(Keyspace::new("sparkify", 1));
        store.ensure_keyspace().await.unwrap();
        for &table in EVENT_TABLES {
            store.ensure_table(table).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn submits_one_batch_per_window() {
        let temp_dir = TempDir::new().unwrap();
        let path = consolidated_file(&temp_dir, 250);
        let store = ready_store().await;

        let loader = BatchLoader::new(&store, EVENT_TABLES, 100).unwrap();
        let stats = loader.load_file(&path).await.unwrap();

        assert_eq!(stats.records_read, 250);
        assert_eq!(stats.batches_submitted, 3);
        assert_eq!(stats.batches_failed, 0);
        assert_eq!(stats.inserts_attempted, 750);
        assert_eq!(store.batches_received(), 3);
        assert_eq!(store.row_count("songs_by_session"), Some(250));
    }

    #[tokio::test]
    async fn exact_multiple_has_no_trailing_window() {
        let temp_dir = TempDir::new().unwrap();
        let path = consolidated_file(&temp_dir, 200);
        let store = ready_store().await;

        let stats = BatchLoader::new(&store, EVENT_TABLES, 100)
            .unwrap()
            .load_file(&path)
            .await
            .unwrap();
        assert_eq!(stats.batches_submitted, 2);
    }

    #[tokio::test]
    async fn failed_window_does_not_stop_later_windows() {
        let temp_dir = TempDir::new().unwrap();
        let path = consolidated_file(&temp_dir, 35);
        let store = ready_store().await.with_failing_batches([1]);

        let stats = BatchLoader::new(&store, EVENT_TABLES, 10)
            .unwrap()
            .load_file(&path)
            .await
            .unwrap();

        assert_eq!(stats.batches_submitted, 4);
        assert_eq!(stats.batches_failed, 1);
        assert_eq!(stats.inserts_attempted, 105);
        assert_eq!(stats.failed_windows.len(), 1);
        assert_eq!(stats.failed_windows[0].window, 1);
        assert_eq!(stats.failed_windows[0].records, 10);
        assert_eq!(store.row_count("songs_by_session"), Some(25));
    }

    #[tokio::test]
    async fn reloading_overwrites_instead_of_duplicating() {
        let temp_dir = TempDir::new().unwrap();
        let path = consolidated_file(&temp_dir, 40);
        let store = ready_store().await;
        let loader = BatchLoader::new(&store, EVENT_TABLES, 100).unwrap();

        loader.load_file(&path).await.unwrap();
        let second = loader.load_file(&path).await.unwrap();

        assert_eq!(second.inserts_attempted, 120);
        assert_eq!(store.row_count("songs_by_session"), Some(40));
        assert_eq!(store.row_count("songs_by_user"), Some(40));
    }

    #[tokio::test]
    async fn empty_file_submits_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = consolidated_file(&temp_dir, 0);
        let store = ready_store().await;

        let stats = BatchLoader::new(&store, EVENT_TABLES, 100)
            .unwrap()
            .load_file(&path)
            .await
            .unwrap();
        assert_eq!(stats, LoadStats::default());
    }

    #[tokio::test]
    async fn non_numeric_session_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.csv");
        fs::write(
            &path,
            format!(
                "{}\n\"A\",\"B\",\"0\",\"C\",\"1.0\",\"abc\",\"S\",\"1\"\n",
                HEADER
            ),
        )
        .unwrap();
        let store = ready_store().await;

        let result = BatchLoader::new(&store, EVENT_TABLES, 100)
            .unwrap()
            .load_file(&path)
            .await;
        assert!(matches!(
            result,
            Err(LoadError::MalformedRecord { line: 2, .. })
        ));
    }

    #[tokio::test]
    async fn unexpected_header_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.csv");
        fs::write(&path, "a,b\n1,2\n").unwrap();
        let store = ready_store().await;

        let result = BatchLoader::new(&store, EVENT_TABLES, 100)
            .unwrap()
            .load_file(&path)
            .await;
        assert!(matches!(result, Err(LoadError::UnexpectedHeader { .. })));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let store = MemoryEventStore::new(Keyspace::new("sparkify", 1));
        assert!(matches!(
            BatchLoader::new(&store, EVENT_TABLES, 0),
            Err(LoadError::InvalidBatchSize)
        ));
    }

    #[tokio::test]
    async fn rejected_submission_is_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let path = consolidated_file(&temp_dir, 3);
        let calls = AtomicUsize::new(0);
        let mut store = MockEventStore::new();
        store
            .expect_submit_batch()
            .times(3)
            .returning(move |batch| {
                assert_eq!(batch.len(), 3);
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(StoreError::BatchRejected("write timeout".to_string())),
                    _ => Ok(()),
                }
            });

        let stats = BatchLoader::new(&store, EVENT_TABLES, 1)
            .unwrap()
            .load_file(&path)
            .await
            .unwrap();

        assert_eq!(stats.batches_submitted, 3);
        assert_eq!(stats.batches_failed, 1);
        assert_eq!(stats.inserts_attempted, 9);
        assert_eq!(stats.failed_windows.len(), 1);
        assert_eq!(stats.failed_windows[0].window, 0);
        assert!(stats.failed_windows[0].error.contains("write timeout"));
    }
}
