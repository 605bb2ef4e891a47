//! Query-first table layouts for the song play events.
//!
//! Every table stores the same events, keyed for one specific lookup:
//! - `songs_by_session`: what was played at a given position of a session
//! - `songs_by_user`: what a user played during a session, in order
//! - `users_by_song`: who listened to a given song

use crate::cql_column;
use crate::cql_persistence::{Column, CqlType, KeyKind, Table};
use crate::events::EventRecord;

use super::models::{Insert, WriteBatch};

pub const SONGS_BY_SESSION: Table = Table {
    name: "songs_by_session",
    columns: &[
        cql_column!("session_id", CqlType::Int, key = KeyKind::Partition),
        cql_column!("item_in_session", CqlType::Int, key = KeyKind::Clustering),
        cql_column!("artist_name", CqlType::Text),
        cql_column!("song_title", CqlType::Text),
        cql_column!("song_length", CqlType::Double),
    ],
};

pub const SONGS_BY_USER: Table = Table {
    name: "songs_by_user",
    columns: &[
        cql_column!("user_id", CqlType::Int, key = KeyKind::Partition),
        cql_column!("session_id", CqlType::Int, key = KeyKind::Partition),
        cql_column!("item_in_session", CqlType::Int, key = KeyKind::Clustering),
        cql_column!("artist_name", CqlType::Text),
        cql_column!("song_title", CqlType::Text),
        cql_column!("user_first_name", CqlType::Text),
        cql_column!("user_last_name", CqlType::Text),
    ],
};

pub const USERS_BY_SONG: Table = Table {
    name: "users_by_song",
    columns: &[
        cql_column!("song_title", CqlType::Text, key = KeyKind::Partition),
        cql_column!("user_id", CqlType::Int, key = KeyKind::Clustering),
        cql_column!("user_first_name", CqlType::Text),
        cql_column!("user_last_name", CqlType::Text),
    ],
};

pub const EVENT_TABLES: &[&Table] = &[&SONGS_BY_SESSION, &SONGS_BY_USER, &USERS_BY_SONG];

/// Builds the insert for `record` into `table`, or returns the name of the
/// first column the record cannot provide.
pub fn insert_for(table: &'static Table, record: &EventRecord) -> Result<Insert, &'static str> {
    let values = table
        .columns
        .iter()
        .map(|column| record.column_value(column.name).ok_or(column.name))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Insert { table, values })
}

/// One insert per table for every record, all in the same batch.
pub fn batch_for(
    tables: &[&'static Table],
    records: &[EventRecord],
) -> Result<WriteBatch, (&'static str, &'static str)> {
    let mut batch = WriteBatch::with_capacity(tables.len() * records.len());
    for record in records {
        for &table in tables {
            let insert = insert_for(table, record).map_err(|column| (table.name, column))?;
            batch.push(insert);
        }
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::ColumnValue;

    fn record() -> EventRecord {
        EventRecord {
            artist_name: "Faithless".to_string(),
            user_first_name: "Ava".to_string(),
            item_in_session: 4,
            user_last_name: "Robinson".to_string(),
            song_length: 495.3073,
            session_id: 338,
            song_title: "Music Matters (Mark Knight Dub)".to_string(),
            user_id: 50,
        }
    }

    #[test]
    fn tables_are_keyed_for_their_queries() {
        assert_eq!(
            SONGS_BY_SESSION.create_statement("sparkify"),
            "CREATE TABLE IF NOT EXISTS sparkify.songs_by_session (session_id int, item_in_session int, artist_name text, song_title text, song_length double, PRIMARY KEY ((session_id), item_in_session))"
        );
        assert_eq!(
            SONGS_BY_USER.create_statement("sparkify"),
            "CREATE TABLE IF NOT EXISTS sparkify.songs_by_user (user_id int, session_id int, item_in_session int, artist_name text, song_title text, user_first_name text, user_last_name text, PRIMARY KEY ((user_id, session_id), item_in_session))"
        );
        assert_eq!(
            USERS_BY_SONG.create_statement("sparkify"),
            "CREATE TABLE IF NOT EXISTS sparkify.users_by_song (song_title text, user_id int, user_first_name text, user_last_name text, PRIMARY KEY ((song_title), user_id))"
        );
    }

    #[test]
    fn insert_follows_table_column_order() {
        let insert = insert_for(&USERS_BY_SONG, &record()).unwrap();
        assert_eq!(
            insert.values,
            vec![
                ColumnValue::Text("Music Matters (Mark Knight Dub)".to_string()),
                ColumnValue::Int(50),
                ColumnValue::Text("Ava".to_string()),
                ColumnValue::Text("Robinson".to_string()),
            ]
        );
    }

    #[test]
    fn batch_has_one_insert_per_table_per_record() {
        let records = vec![record(), record()];
        let batch = batch_for(EVENT_TABLES, &records).unwrap();
        assert_eq!(batch.len(), 6);
    }

    #[test]
    fn unknown_column_is_reported() {
        const BROKEN: Table = Table {
            name: "broken",
            columns: &[cql_column!("page", CqlType::Text, key = KeyKind::Partition)],
        };
        let result = batch_for(&[&BROKEN], &[record()]);
        assert_eq!(result.err(), Some(("broken", "page")));
    }
}
