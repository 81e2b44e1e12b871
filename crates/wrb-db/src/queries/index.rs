//! Per-query index derived from the event log.
//!
//! The index holds nothing that is not in `events`: [`rebuild`] drops it and
//! replays the whole log, and must land on the same rows as incremental
//! [`apply`] calls did.

use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use wrb_types::{Address, Amount, BoardEvent, EventRecord, QueryId};

use crate::{DbError, Result};

/// Indexed summary of one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryIndexRow {
    pub query_id: QueryId,
    pub requester: Address,
    /// `posted`, `reported`, `delivered`, `undeliverable` or `void`.
    pub status: String,
    pub reward: Amount,
    pub base_fee: Amount,
    pub posted_block: u64,
    pub reporter: Option<Address>,
    pub resolved_at: Option<u64>,
    pub callback_gas_used: Option<u64>,
    pub failure_reason: Option<String>,
    pub refund: Option<Amount>,
    pub updated_seq: u64,
}

/// Fold one record into the index.
///
/// Records that concern no query are ignored. Records for queries whose
/// posting is not indexed are skipped with a warning.
pub fn apply(conn: &Connection, record: &EventRecord) -> Result<()> {
    let seq = record.seq as i64;
    let updated = match &record.event {
        BoardEvent::QueryPosted {
            query_id,
            requester,
            reward,
            base_fee,
        } => conn.execute(
            "INSERT OR REPLACE INTO query_index
                 (query_id, requester, status, reward, base_fee, posted_seq, posted_block, updated_seq)
             VALUES (?1, ?2, 'posted', ?3, ?4, ?5, ?6, ?5)",
            rusqlite::params![
                *query_id as i64,
                requester.as_bytes().as_slice(),
                reward.to_string(),
                base_fee.to_string(),
                seq,
                record.block as i64,
            ],
        )?,
        BoardEvent::QueryRewardUpgraded {
            query_id, reward, ..
        } => conn.execute(
            "UPDATE query_index SET reward = ?2, updated_seq = ?3 WHERE query_id = ?1",
            rusqlite::params![*query_id as i64, reward.to_string(), seq],
        )?,
        BoardEvent::QueryReported {
            query_id,
            reporter,
            timestamp,
        } => conn.execute(
            "UPDATE query_index
             SET status = 'reported', reward = '0', reporter = ?2, resolved_at = ?3, updated_seq = ?4
             WHERE query_id = ?1",
            rusqlite::params![
                *query_id as i64,
                reporter.as_bytes().as_slice(),
                *timestamp as i64,
                seq,
            ],
        )?,
        BoardEvent::ResponseDelivered {
            query_id,
            callback_gas_used,
            ..
        } => conn.execute(
            "UPDATE query_index
             SET status = 'delivered', reward = '0', callback_gas_used = ?2, resolved_at = ?3, updated_seq = ?4
             WHERE query_id = ?1",
            rusqlite::params![
                *query_id as i64,
                *callback_gas_used as i64,
                record.timestamp as i64,
                seq,
            ],
        )?,
        BoardEvent::ResponseDeliveryFailed {
            query_id,
            callback_gas_used,
            reason,
            ..
        } => conn.execute(
            "UPDATE query_index
             SET status = 'undeliverable', reward = '0', callback_gas_used = ?2, failure_reason = ?3,
                 resolved_at = ?4, updated_seq = ?5
             WHERE query_id = ?1",
            rusqlite::params![
                *query_id as i64,
                *callback_gas_used as i64,
                reason,
                record.timestamp as i64,
                seq,
            ],
        )?,
        BoardEvent::QueryPurged {
            query_id, refund, ..
        } => conn.execute(
            "UPDATE query_index
             SET status = 'void', reward = '0', refund = ?2, updated_seq = ?3
             WHERE query_id = ?1",
            rusqlite::params![*query_id as i64, refund.to_string(), seq],
        )?,
        BoardEvent::BatchReportError { .. }
        | BoardEvent::ReportersSet { .. }
        | BoardEvent::ReportersUnset { .. }
        | BoardEvent::OwnershipTransferStarted { .. }
        | BoardEvent::OwnershipTransferred { .. } => return Ok(()),
    };
    if updated == 0 {
        tracing::warn!(
            seq = record.seq,
            event = record.event.name(),
            "event for a query missing from the index"
        );
    }
    Ok(())
}

/// Drop the index and replay every stored event. Returns the number of
/// records replayed.
pub fn rebuild(conn: &Connection) -> Result<u64> {
    conn.execute("DELETE FROM query_index", [])?;
    let mut cursor = 0;
    let mut replayed = 0;
    loop {
        let page = crate::queries::events::since(conn, cursor, 512)?;
        let Some(last) = page.last() else {
            break;
        };
        cursor = last.seq;
        for record in &page {
            apply(conn, record)?;
            replayed += 1;
        }
    }
    tracing::info!(replayed, "Query index rebuilt from events");
    Ok(replayed)
}

/// Get the indexed summary of one query.
pub fn get(conn: &Connection, query_id: QueryId) -> Result<QueryIndexRow> {
    conn.query_row(
        &format!("{SELECT_ROW} WHERE query_id = ?1"),
        [query_id as i64],
        raw_row,
    )
    .optional()?
    .ok_or_else(|| DbError::NotFound(format!("query {query_id}")))?
    .decode()
}

/// Queries posted by one requester, oldest first.
pub fn by_requester(conn: &Connection, requester: &Address) -> Result<Vec<QueryIndexRow>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_ROW} WHERE requester = ?1 ORDER BY query_id ASC"
    ))?;
    let rows = stmt
        .query_map([requester.as_bytes().as_slice()], raw_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(RawIndexRow::decode).collect()
}

/// Number of indexed queries per status.
pub fn count_by_status(conn: &Connection) -> Result<Vec<(String, u64)>> {
    let mut stmt = conn.prepare(
        "SELECT status, COUNT(*) FROM query_index GROUP BY status ORDER BY status",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

const SELECT_ROW: &str = "SELECT query_id, requester, status, reward, base_fee, posted_block,
        reporter, resolved_at, callback_gas_used, failure_reason, refund, updated_seq
     FROM query_index";

/// A row as SQLite returns it, before address and amount parsing.
struct RawIndexRow {
    query_id: i64,
    requester: Vec<u8>,
    status: String,
    reward: String,
    base_fee: String,
    posted_block: i64,
    reporter: Option<Vec<u8>>,
    resolved_at: Option<i64>,
    callback_gas_used: Option<i64>,
    failure_reason: Option<String>,
    refund: Option<String>,
    updated_seq: i64,
}

impl RawIndexRow {
    fn decode(self) -> Result<QueryIndexRow> {
        Ok(QueryIndexRow {
            query_id: self.query_id as u64,
            requester: address(self.requester)?,
            status: self.status,
            reward: amount(&self.reward)?,
            base_fee: amount(&self.base_fee)?,
            posted_block: self.posted_block as u64,
            reporter: self.reporter.map(address).transpose()?,
            resolved_at: self.resolved_at.map(|t| t as u64),
            callback_gas_used: self.callback_gas_used.map(|g| g as u64),
            failure_reason: self.failure_reason,
            refund: self.refund.as_deref().map(amount).transpose()?,
            updated_seq: self.updated_seq as u64,
        })
    }
}

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawIndexRow> {
    Ok(RawIndexRow {
        query_id: row.get(0)?,
        requester: row.get(1)?,
        status: row.get(2)?,
        reward: row.get(3)?,
        base_fee: row.get(4)?,
        posted_block: row.get(5)?,
        reporter: row.get(6)?,
        resolved_at: row.get(7)?,
        callback_gas_used: row.get(8)?,
        failure_reason: row.get(9)?,
        refund: row.get(10)?,
        updated_seq: row.get(11)?,
    })
}

fn address(raw: Vec<u8>) -> Result<Address> {
    let bytes: [u8; 20] = raw
        .try_into()
        .map_err(|_| DbError::Serialization("address must be 20 bytes".to_string()))?;
    Ok(Address(bytes))
}

fn amount(text: &str) -> Result<Amount> {
    text.parse()
        .map_err(|e: std::num::ParseIntError| DbError::Serialization(e.to_string()))
}
