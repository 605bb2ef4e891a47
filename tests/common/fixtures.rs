//! Raw event fixtures and configuration helpers.
//!
//! The sample data holds two song plays and one login. The plays match the
//! default verification keys so every canned query returns exactly one row.

use sparkify_loader::config::{AppConfig, CliConfig, StoreBackend};
use sparkify_loader::cql_persistence::Keyspace;
use sparkify_loader::event_store::{EventStore, MemoryEventStore};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const RAW_HEADER: &str = "artist,auth,firstName,gender,itemInSession,lastName,length,level,location,method,page,registration,sessionId,song,status,ts,userId";

pub const KEYSPACE: &str = "sparkify_test";

/// Song at item 4 of session 338.
pub const SESSION_SONG: &str = "Music Matters (Mark Knight Dub)";

/// Song played by user 10 in session 182.
pub const USER_SONG: &str = "All Hands Against His Own";

pub fn sample_event_lines() -> Vec<String> {
    vec![
        format!(
            "Faithless,Logged In,Ava,F,4,Robinson,495.3073,free,\"New Haven-Milford, CT\",PUT,NextSong,1.54002E+12,338,\"{}\",200,1.54106E+12,50",
            SESSION_SONG
        ),
        ",Logged In,Walter,M,0,Frye,,free,\"San Francisco-Oakland-Hayward, CA\",GET,Login,1.54092E+12,38,,200,1.54111E+12,39".to_string(),
        format!(
            "The Black Keys,Logged In,Sylvie,F,0,Cruz,196.91057,free,\"Washington-Arlington-Alexandria, DC-VA-MD-WV\",PUT,NextSong,1.54027E+12,182,{},200,1.54111E+12,10",
            USER_SONG
        ),
    ]
}

/// Writes `lines` under `dir/name` preceded by the raw header.
pub fn write_event_file(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut content = String::from(RAW_HEADER);
    content.push('\n');
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    fs::write(&path, content).unwrap();
    path
}

/// Writes the sample events as one day file under `root/event_data`.
pub fn write_sample_events(root: &Path) -> PathBuf {
    write_event_file(
        &root.join("event_data"),
        "2018-11-01-events.csv",
        &sample_event_lines(),
    )
}

/// Configuration reading `root/event_data` and writing the consolidated
/// file to `root/event_datafile_new.csv`, backed by the in-memory store.
pub fn memory_config(root: &Path) -> AppConfig {
    let cli = CliConfig {
        input_dir: root.join("event_data"),
        output_file: root.join("event_datafile_new.csv"),
        backend: StoreBackend::Memory,
        keyspace: KEYSPACE.to_string(),
        ..CliConfig::default()
    };
    AppConfig::resolve(&cli, None).unwrap()
}

pub fn memory_store() -> Arc<MemoryEventStore> {
    Arc::new(MemoryEventStore::new(Keyspace::new(KEYSPACE, 1)))
}

pub fn as_event_store(store: &Arc<MemoryEventStore>) -> Arc<dyn EventStore> {
    store.clone()
}
