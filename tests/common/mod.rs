//! Shared test helpers and utilities.
//!
//! Provides factory functions for building throwaway trace databases shaped
//! like the ones the instrumented ordering service writes.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use reqtrace_data::types::EventKind;
use rusqlite::Connection;

/// Creates a trace database at `dir/events.sqlite` holding `rows`.
///
/// Rows are `(ts, event, nodeId, clSn)` tuples matching the tracer's
/// `request` table layout.
///
/// # Panics
/// Panics if the database or table cannot be created.
///
/// # Example
/// ```ignore
/// let db = write_event_db(dir.path(), &[(100, "REQ_SEND", 1, 5)]);
/// ```
pub fn write_event_db(dir: &Path, rows: &[(i64, &str, i64, i64)]) -> PathBuf {
    let path = dir.join("events.sqlite");
    let conn = Connection::open(&path).expect("create trace database");
    conn.execute(
        "CREATE TABLE request (ts INTEGER, event TEXT, nodeId INTEGER, clSn INTEGER)",
        [],
    )
    .expect("create request table");
    for (ts, event, node_id, client_sn) in rows {
        conn.execute(
            "INSERT INTO request (ts, event, nodeId, clSn) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![ts, event, node_id, client_sn],
        )
        .expect("insert trace row");
    }
    path
}

/// Builds one complete request trace: all seven lifecycle events in order.
///
/// # Arguments
/// * `node_id` - Node the trace rows are attributed to
/// * `client_sn` - Client sequence number of the request
/// * `stamps` - Timestamps of REQ_SEND through ENOUGH_RESP, in that order
///
/// # Example
/// ```ignore
/// let rows = complete_trace(1, 5, [100, 105, 110, 120, 130, 135, 140]);
/// assert_eq!(rows.len(), 7);
/// ```
pub fn complete_trace(
    node_id: i64,
    client_sn: i64,
    stamps: [i64; EventKind::COUNT],
) -> Vec<(i64, &'static str, i64, i64)> {
    EventKind::ALL
        .into_iter()
        .zip(stamps)
        .map(|(kind, ts)| (ts, kind.as_str(), node_id, client_sn))
        .collect()
}
