use crate::event_store::ColumnValue;
use csv::StringRecord;
use serde::Deserialize;

/// Number of columns in a raw event log file.
pub const RAW_COLUMN_COUNT: usize = 17;

/// Positions of the fields we care about in a raw event log row.
mod raw_index {
    pub const ARTIST: usize = 0;
    pub const FIRST_NAME: usize = 2;
    pub const ITEM_IN_SESSION: usize = 4;
    pub const LAST_NAME: usize = 5;
    pub const LENGTH: usize = 6;
    pub const PAGE: usize = 10;
    pub const SESSION_ID: usize = 12;
    pub const SONG: usize = 13;
    pub const USER_ID: usize = 16;
}

/// Header of the consolidated event file, in column order.
pub const CONSOLIDATED_HEADER: [&str; 8] = [
    "artist_name",
    "user_first_name",
    "item_in_session",
    "user_last_name",
    "song_length",
    "session_id",
    "song_title",
    "user_id",
];

/// A raw event log row with its positional fields bound to names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEventRecord<'r> {
    pub artist: &'r str,
    pub first_name: &'r str,
    pub item_in_session: &'r str,
    pub last_name: &'r str,
    pub length: &'r str,
    pub page: &'r str,
    pub session_id: &'r str,
    pub song: &'r str,
    pub user_id: &'r str,
}

impl<'r> RawEventRecord<'r> {
    /// Binds a row by position. Returns None if the row is too short to
    /// contain every referenced field.
    pub fn bind(record: &'r StringRecord) -> Option<Self> {
        Some(Self {
            artist: record.get(raw_index::ARTIST)?,
            first_name: record.get(raw_index::FIRST_NAME)?,
            item_in_session: record.get(raw_index::ITEM_IN_SESSION)?,
            last_name: record.get(raw_index::LAST_NAME)?,
            length: record.get(raw_index::LENGTH)?,
            page: record.get(raw_index::PAGE)?,
            session_id: record.get(raw_index::SESSION_ID)?,
            song: record.get(raw_index::SONG)?,
            user_id: record.get(raw_index::USER_ID)?,
        })
    }

    /// Exact, case-sensitive match on the event-type field.
    pub fn is_event(&self, event_type: &str) -> bool {
        self.page == event_type
    }

    /// The consolidated projection, ordered like `CONSOLIDATED_HEADER`.
    pub fn project(&self) -> [&'r str; 8] {
        [
            self.artist,
            self.first_name,
            self.item_in_session,
            self.last_name,
            self.length,
            self.session_id,
            self.song,
            self.user_id,
        ]
    }
}

/// A "song played" event as read back from the consolidated file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventRecord {
    pub artist_name: String,
    pub user_first_name: String,
    pub item_in_session: i32,
    pub user_last_name: String,
    pub song_length: f64,
    pub session_id: i32,
    pub song_title: String,
    pub user_id: i32,
}

impl EventRecord {
    pub fn validate(&self) -> Result<(), String> {
        if self.item_in_session < 0 {
            return Err(format!(
                "item_in_session must be non-negative, got {}",
                self.item_in_session
            ));
        }
        if !self.song_length.is_finite() {
            return Err(format!("song_length is not finite: {}", self.song_length));
        }
        Ok(())
    }

    /// Looks up a field by its consolidated column name.
    pub fn column_value(&self, column: &str) -> Option<ColumnValue> {
        let value = match column {
            "artist_name" => ColumnValue::Text(self.artist_name.clone()),
            "user_first_name" => ColumnValue::Text(self.user_first_name.clone()),
            "item_in_session" => ColumnValue::Int(self.item_in_session),
            "user_last_name" => ColumnValue::Text(self.user_last_name.clone()),
            "song_length" => ColumnValue::Double(self.song_length),
            "session_id" => ColumnValue::Int(self.session_id),
            "song_title" => ColumnValue::Text(self.song_title.clone()),
            "user_id" => ColumnValue::Int(self.user_id),
            _ => return None,
        };
        Some(value)
    }
}
