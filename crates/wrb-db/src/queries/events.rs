//! Event log query functions.

use rusqlite::{Connection, OptionalExtension, Row};
use wrb_types::{EventRecord, QueryId};

use crate::{DbError, Result};

/// Append one record. Sequence numbers must follow the last stored one.
pub fn append(conn: &Connection, record: &EventRecord) -> Result<()> {
    let expected = last_seq(conn)? + 1;
    if record.seq != expected {
        return Err(DbError::OutOfOrder {
            expected,
            actual: record.seq,
        });
    }
    let body = serde_json::to_string(&record.event)?;
    conn.execute(
        "INSERT INTO events (seq, block, timestamp, name, query_id, body)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            record.seq as i64,
            record.block as i64,
            record.timestamp as i64,
            record.event.name(),
            record.event.query_id().map(|id| id as i64),
            body,
        ],
    )?;
    Ok(())
}

/// Sequence number of the last stored record, 0 when empty.
pub fn last_seq(conn: &Connection) -> Result<u64> {
    let seq: Option<i64> = conn
        .query_row("SELECT MAX(seq) FROM events", [], |row| row.get(0))
        .optional()?
        .flatten();
    Ok(seq.unwrap_or(0) as u64)
}

/// Records with `seq > after`, oldest first.
pub fn since(conn: &Connection, after: u64, limit: u32) -> Result<Vec<EventRecord>> {
    let mut stmt = conn.prepare(
        "SELECT seq, block, timestamp, body FROM events
         WHERE seq > ?1 ORDER BY seq ASC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![after as i64, limit], raw_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(RawRecord::decode).collect()
}

/// Every record concerning one query, oldest first.
pub fn for_query(conn: &Connection, query_id: QueryId) -> Result<Vec<EventRecord>> {
    let mut stmt = conn.prepare(
        "SELECT seq, block, timestamp, body FROM events
         WHERE query_id = ?1 ORDER BY seq ASC",
    )?;
    let rows = stmt
        .query_map([query_id as i64], raw_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(RawRecord::decode).collect()
}

/// Number of records carrying a given event name.
pub fn count_by_name(conn: &Connection, name: &str) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM events WHERE name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

struct RawRecord {
    seq: i64,
    block: i64,
    timestamp: i64,
    body: String,
}

impl RawRecord {
    fn decode(self) -> Result<EventRecord> {
        Ok(EventRecord {
            seq: self.seq as u64,
            block: self.block as u64,
            timestamp: self.timestamp as u64,
            event: serde_json::from_str(&self.body)?,
        })
    }
}

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        seq: row.get(0)?,
        block: row.get(1)?,
        timestamp: row.get(2)?,
        body: row.get(3)?,
    })
}
