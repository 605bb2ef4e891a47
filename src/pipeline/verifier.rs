//! Canned acceptance queries, one per table layout.

use super::report::Outcome;
use crate::event_store::{
    ColumnValue, EventStore, Row, SelectQuery, SONGS_BY_SESSION, SONGS_BY_USER, USERS_BY_SONG,
};
use tracing::{error, info};

/// Keys used by the canned queries. The defaults match the Sparkify sample
/// event data and are fixtures, not a general query interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationKeys {
    pub session_id: i32,
    pub item_in_session: i32,
    pub user_id: i32,
    pub user_session_id: i32,
    pub song_title: String,
}

impl Default for VerificationKeys {
    fn default() -> Self {
        Self {
            session_id: 338,
            item_in_session: 4,
            user_id: 10,
            user_session_id: 182,
            song_title: "All Hands Against His Own".to_string(),
        }
    }
}

pub struct CannedQuery {
    pub name: &'static str,
    pub query: SelectQuery,
}

pub fn canned_queries(keys: &VerificationKeys) -> Vec<CannedQuery> {
    vec![
        CannedQuery {
            name: "song played at session position",
            query: SelectQuery::new(
                &SONGS_BY_SESSION,
                &["artist_name", "song_title", "song_length"],
            )
            .filter("session_id", ColumnValue::Int(keys.session_id))
            .filter("item_in_session", ColumnValue::Int(keys.item_in_session)),
        },
        CannedQuery {
            name: "songs played by user in session",
            query: SelectQuery::new(
                &SONGS_BY_USER,
                &[
                    "item_in_session",
                    "artist_name",
                    "song_title",
                    "user_first_name",
                    "user_last_name",
                ],
            )
            .filter("user_id", ColumnValue::Int(keys.user_id))
            .filter("session_id", ColumnValue::Int(keys.user_session_id))
            .order_by("item_in_session"),
        },
        CannedQuery {
            name: "users who listened to song",
            query: SelectQuery::new(&USERS_BY_SONG, &["user_first_name", "user_last_name"])
                .filter("song_title", ColumnValue::Text(keys.song_title.clone())),
        },
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub name: &'static str,
    pub rows: Result<Vec<Row>, String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifyReport {
    pub queries: Vec<QueryOutcome>,
}

impl VerifyReport {
    pub fn outcomes(&self) -> Vec<Outcome> {
        self.queries
            .iter()
            .map(|q| match &q.rows {
                Ok(_) => Outcome::ok(q.name),
                Err(e) => Outcome::failed(q.name, e),
            })
            .collect()
    }

    pub fn rows_returned(&self) -> usize {
        self.queries
            .iter()
            .filter_map(|q| q.rows.as_ref().ok())
            .map(|rows| rows.len())
            .sum()
    }
}

fn format_row(row: &Row) -> String {
    row.iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Runs every canned query, printing each result row. A failing query is
/// reported and the remaining ones still run.
pub async fn verify(store: &dyn EventStore, keys: &VerificationKeys) -> VerifyReport {
    let mut report = VerifyReport::default();
    for canned in canned_queries(keys) {
        let rows = match store.select(&canned.query).await {
            Ok(rows) => {
                info!("{}: {} rows", canned.name, rows.len());
                for row in &rows {
                    info!("  {}", format_row(row));
                }
                Ok(rows)
            }
            Err(e) => {
                error!("{} failed: {}", canned.name, e);
                Err(e.to_string())
            }
        };
        report.queries.push(QueryOutcome {
            name: canned.name,
            rows,
        });
    }
    report
}
