//! Read-only access to SQLite trace databases.

use std::path::Path;

use eyre::{Result, WrapErr};
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, warn};

use crate::types::{EventKind, EventRecord, RequestId};

/// Handle on one trace database.
///
/// The tracer writes a single `request` table with one row per observed
/// lifecycle event: `(ts, event, nodeId, clSn)`. The connection is opened
/// read-only so an analysis run can never disturb a capture.
pub struct EventStore {
    conn: Connection,
}

impl EventStore {
    /// Opens an existing trace database.
    ///
    /// Fails if the file does not exist; this tool never creates databases.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .wrap_err_with(|| format!("failed to open trace database {}", path.display()))?;
        Ok(Self { conn })
    }

    /// Loads every row whose event name belongs to the tracked lifecycle.
    ///
    /// The tracer also records marker events (batch cuts, view changes) that
    /// carry no per-request timing; those rows are skipped, not rejected.
    pub fn load_events(&self) -> Result<Vec<EventRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT ts, event, nodeId, clSn FROM request")
            .wrap_err("failed to query the request table")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()
            .wrap_err("failed to read event rows")?;

        let mut events = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for (timestamp, name, node_id, client_sn) in rows {
            match EventKind::from_name(&name) {
                Some(kind) => events.push(EventRecord {
                    timestamp,
                    kind,
                    request: RequestId { node_id, client_sn },
                }),
                None => {
                    debug!(event = %name, node_id, client_sn, "skipping untracked event kind");
                    skipped += 1;
                }
            }
        }
        if skipped > 0 {
            warn!(skipped, "ignored rows with event kinds outside the request lifecycle");
        }
        Ok(events)
    }

    /// Distinct request identities present in the log, in table order.
    pub fn distinct_requests(&self) -> Result<Vec<RequestId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT nodeId, clSn FROM request")
            .wrap_err("failed to query the request table")?;
        let ids = stmt
            .query_map([], |row| {
                Ok(RequestId {
                    node_id: row.get(0)?,
                    client_sn: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .wrap_err("failed to read request identities")?;
        Ok(ids)
    }

    /// Total number of rows in the log, tracked kinds or not.
    pub fn count_events(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM request", [], |row| row.get(0))
            .wrap_err("failed to count event rows")?;
        Ok(count as u64)
    }

    /// Number of distinct `(nodeId, clSn)` identities in the log.
    pub fn count_distinct_requests(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM (SELECT DISTINCT nodeId, clSn FROM request)",
                [],
                |row| row.get(0),
            )
            .wrap_err("failed to count request identities")?;
        Ok(count as u64)
    }

    /// Row counts per stored event name, most frequent first.
    pub fn event_name_counts(&self) -> Result<Vec<(String, u64)>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT event, COUNT(*) AS n FROM request GROUP BY event ORDER BY n DESC, event",
            )
            .wrap_err("failed to query the request table")?;
        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()
            .wrap_err("failed to read event name counts")?;
        Ok(counts)
    }

    /// Earliest and latest timestamps in the log, `None` when the log is empty.
    pub fn timestamp_range(&self) -> Result<Option<(i64, i64)>> {
        let (min, max): (Option<i64>, Option<i64>) = self
            .conn
            .query_row("SELECT MIN(ts), MAX(ts) FROM request", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .wrap_err("failed to read the timestamp range")?;
        Ok(min.zip(max))
    }
}
