use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub input_dir: Option<String>,
    pub output_file: Option<String>,
    pub event_filter: Option<String>,

    // Sections
    pub store: Option<StoreConfig>,
    pub loader: Option<LoaderConfig>,
    pub verify: Option<VerifyConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// Store backend to use: "cql", "memory"
    pub backend: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub keyspace: Option<String>,
    pub replication_factor: Option<u32>,
    pub connect_timeout_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct LoaderConfig {
    pub batch_size: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct VerifyConfig {
    pub session_id: Option<i32>,
    pub item_in_session: Option<i32>,
    pub user_id: Option<i32>,
    pub user_session_id: Option<i32>,
    pub song_title: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
