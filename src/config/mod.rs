mod file_config;

pub use file_config::{FileConfig, LoaderConfig, StoreConfig, VerifyConfig};

use crate::cql_persistence::Keyspace;
use crate::pipeline::{VerificationKeys, DEFAULT_BATCH_SIZE};
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_INPUT_DIR: &str = "event_data";
pub const DEFAULT_OUTPUT_FILE: &str = "event_datafile_new.csv";
pub const DEFAULT_EVENT_FILTER: &str = "NextSong";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9042;
pub const DEFAULT_KEYSPACE: &str = "sparkify";
pub const DEFAULT_REPLICATION_FACTOR: u32 = 1;
pub const DEFAULT_CONNECT_TIMEOUT_SEC: u64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// Cassandra or ScyllaDB over CQL.
    #[default]
    Cql,
    /// In-process store, nothing is persisted.
    Memory,
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub input_dir: PathBuf,
    pub output_file: PathBuf,
    pub event_filter: String,
    pub backend: StoreBackend,
    pub host: String,
    pub port: u16,
    pub keyspace: String,
    pub replication_factor: u32,
    pub connect_timeout_sec: u64,
    pub batch_size: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_file: PathBuf::from(DEFAULT_OUTPUT_FILE),
            event_filter: DEFAULT_EVENT_FILTER.to_string(),
            backend: StoreBackend::default(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            keyspace: DEFAULT_KEYSPACE.to_string(),
            replication_factor: DEFAULT_REPLICATION_FACTOR,
            connect_timeout_sec: DEFAULT_CONNECT_TIMEOUT_SEC,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub host: String,
    pub port: u16,
    pub keyspace: String,
    pub replication_factor: u32,
    pub connect_timeout_sec: u64,
}

impl StoreSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn keyspace(&self) -> Keyspace {
        Keyspace::new(&self.keyspace, self.replication_factor)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_sec)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub input_dir: PathBuf,
    pub output_file: PathBuf,
    pub event_filter: String,
    pub batch_size: usize,
    pub store: StoreSettings,
    pub verification: VerificationKeys,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let input_dir = file
            .input_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.input_dir.clone());
        let output_file = file
            .output_file
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.output_file.clone());
        let event_filter = file
            .event_filter
            .unwrap_or_else(|| cli.event_filter.clone());
        if event_filter.is_empty() {
            bail!("event_filter must not be empty");
        }

        let store_file = file.store.unwrap_or_default();
        let backend = match store_file.backend {
            Some(name) => match parse_store_backend(&name) {
                Some(backend) => backend,
                None => bail!("Unknown store backend {:?}, expected \"cql\" or \"memory\"", name),
            },
            None => cli.backend,
        };
        let store = StoreSettings {
            backend,
            host: store_file.host.unwrap_or_else(|| cli.host.clone()),
            port: store_file.port.unwrap_or(cli.port),
            keyspace: store_file
                .keyspace
                .unwrap_or_else(|| cli.keyspace.clone()),
            replication_factor: store_file
                .replication_factor
                .unwrap_or(cli.replication_factor),
            connect_timeout_sec: store_file
                .connect_timeout_sec
                .unwrap_or(cli.connect_timeout_sec),
        };
        if store.keyspace.is_empty() {
            bail!("keyspace must not be empty");
        }
        if store.replication_factor == 0 {
            bail!("replication_factor must be greater than zero");
        }

        let batch_size = file
            .loader
            .and_then(|loader| loader.batch_size)
            .unwrap_or(cli.batch_size);
        if batch_size == 0 {
            bail!("batch_size must be greater than zero");
        }

        // Verification keys only come from the config file
        let verify_file = file.verify.unwrap_or_default();
        let defaults = VerificationKeys::default();
        let verification = VerificationKeys {
            session_id: verify_file.session_id.unwrap_or(defaults.session_id),
            item_in_session: verify_file
                .item_in_session
                .unwrap_or(defaults.item_in_session),
            user_id: verify_file.user_id.unwrap_or(defaults.user_id),
            user_session_id: verify_file
                .user_session_id
                .unwrap_or(defaults.user_session_id),
            song_title: verify_file.song_title.unwrap_or(defaults.song_title),
        };

        Ok(Self {
            input_dir,
            output_file,
            event_filter,
            batch_size,
            store,
            verification,
        })
    }
}

fn parse_store_backend(s: &str) -> Option<StoreBackend> {
    match s.to_lowercase().as_str() {
        "cql" | "cassandra" | "scylla" => Some(StoreBackend::Cql),
        "memory" => Some(StoreBackend::Memory),
        _ => None,
    }
}
