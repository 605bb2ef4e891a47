//! Consolidates raw event log files into a single "song played" CSV.

use super::models::{RawEventRecord, CONSOLIDATED_HEADER, RAW_COLUMN_COUNT};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Input directory does not exist: {0:?}")]
    MissingInputDir(PathBuf),

    #[error("Failed to scan {path:?}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path:?} has {found} header columns, expected {expected}")]
    HeaderWidth {
        path: PathBuf,
        found: usize,
        expected: usize,
    },

    #[error("Malformed row at {path:?} line {line}: found {found} fields, expected {expected}")]
    MalformedRow {
        path: PathBuf,
        line: u64,
        found: usize,
        expected: usize,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Counters reported by a single aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub files_scanned: usize,
    pub records_read: usize,
    pub records_written: usize,
}

impl AggregateStats {
    pub fn records_discarded(&self) -> usize {
        self.records_read - self.records_written
    }
}

pub struct Aggregator {
    input_dir: PathBuf,
    event_filter: String,
}

impl Aggregator {
    pub fn new(input_dir: impl Into<PathBuf>, event_filter: impl Into<String>) -> Self {
        Self {
            input_dir: input_dir.into(),
            event_filter: event_filter.into(),
        }
    }

    /// Recursively lists the `.csv` files under the input directory.
    ///
    /// Callers must not rely on any particular order across files. Entries are
    /// sorted by file name within each directory only so that repeated runs
    /// over the same tree produce the same output.
    pub fn discover_files(&self) -> Result<Vec<PathBuf>, AggregateError> {
        if !self.input_dir.is_dir() {
            return Err(AggregateError::MissingInputDir(self.input_dir.clone()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.input_dir).sort_by_file_name() {
            let entry = entry.map_err(|source| AggregateError::Walk {
                path: self.input_dir.clone(),
                source,
            })?;
            if entry.file_type().is_file() && is_csv(entry.path()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Writes every qualifying record to `output`, replacing any previous
    /// content. Any unreadable file or malformed row aborts the whole run.
    ///
    /// Records are staged in a temporary file next to `output` that only
    /// replaces it once every input file has been consumed. A failed run
    /// leaves the previous `output` untouched.
    pub fn aggregate_to(&self, output: &Path) -> Result<AggregateStats, AggregateError> {
        let output_canonical = output.canonicalize().ok();
        let files: Vec<PathBuf> = self
            .discover_files()?
            .into_iter()
            .filter(|path| {
                output_canonical.is_none() || path.canonicalize().ok() != output_canonical
            })
            .collect();
        info!(
            "Found {} event files under {:?}",
            files.len(),
            self.input_dir
        );

        let parent = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| AggregateError::Io { path, source }
        };
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
        let mut staging = NamedTempFile::new_in(parent).map_err(io_err(parent))?;

        let write_err = |source| AggregateError::Write {
            path: output.to_path_buf(),
            source,
        };
        let mut stats = AggregateStats::default();
        {
            let mut writer = csv::WriterBuilder::new()
                .quote_style(csv::QuoteStyle::Always)
                .from_writer(staging.as_file_mut());
            writer.write_record(CONSOLIDATED_HEADER).map_err(write_err)?;

            for path in &files {
                self.aggregate_file(path, &mut writer, write_err, &mut stats)?;
                stats.files_scanned += 1;
            }
            writer.flush().map_err(io_err(output))?;
        }
        staging
            .persist(output)
            .map_err(|e| io_err(output)(e.error))?;

        info!(
            "Aggregated {} files: {} records read, {} written, {} discarded",
            stats.files_scanned,
            stats.records_read,
            stats.records_written,
            stats.records_discarded()
        );
        Ok(stats)
    }

    fn aggregate_file<W: std::io::Write>(
        &self,
        path: &Path,
        writer: &mut csv::Writer<W>,
        write_err: impl Fn(csv::Error) -> AggregateError,
        stats: &mut AggregateStats,
    ) -> Result<(), AggregateError> {
        let read_err = |source| AggregateError::Read {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(read_err)?;

        let header_width = reader.headers().map_err(read_err)?.len();
        if header_width != RAW_COLUMN_COUNT {
            return Err(AggregateError::HeaderWidth {
                path: path.to_path_buf(),
                found: header_width,
                expected: RAW_COLUMN_COUNT,
            });
        }

        let mut written = 0;
        let mut read = 0;
        for result in reader.records() {
            let record = result.map_err(read_err)?;
            let malformed = || AggregateError::MalformedRow {
                path: path.to_path_buf(),
                line: record.position().map(|p| p.line()).unwrap_or_default(),
                found: record.len(),
                expected: RAW_COLUMN_COUNT,
            };
            let raw = RawEventRecord::bind(&record).ok_or_else(malformed)?;
            read += 1;
            if raw.is_event(&self.event_filter) {
                writer.write_record(raw.project()).map_err(&write_err)?;
                written += 1;
            }
        }

        debug!("{:?}: {} records, {} kept", path, read, written);
        stats.records_read += read;
        stats.records_written += written;
        Ok(())
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}
