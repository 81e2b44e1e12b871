//! Event journal: the event log and its index behind one handle.

use std::path::Path;

use rusqlite::Connection;
use wrb_types::{Address, EventRecord, QueryId};

use crate::queries::index::QueryIndexRow;
use crate::queries::{events, index, settings};
use crate::Result;

pub struct Journal {
    conn: Connection,
}

impl Journal {
    /// Open or create the journal database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`](crate::DbError) if the file cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: crate::open(path)?,
        })
    }

    /// Open a journal that lives only as long as the handle.
    pub fn open_memory() -> Result<Self> {
        Ok(Self {
            conn: crate::open_memory()?,
        })
    }

    /// Append records and fold them into the index, all or nothing.
    pub fn record(&mut self, records: &[EventRecord]) -> Result<()> {
        let Some(last) = records.last() else {
            return Ok(());
        };
        let tx = self.conn.transaction()?;
        for record in records {
            events::append(&tx, record)?;
            index::apply(&tx, record)?;
        }
        settings::set(&tx, "indexed_seq", &last.seq.to_string())?;
        tx.commit()?;
        tracing::debug!(count = records.len(), last_seq = last.seq, "Journaled events");
        Ok(())
    }

    /// Forget all history. Used when the board starts from genesis again.
    pub fn reset(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM query_index;
             DELETE FROM events;",
        )?;
        settings::set(&tx, "indexed_seq", "0")?;
        settings::set(&tx, "chain_height", "0")?;
        tx.commit()?;
        Ok(())
    }

    /// Rebuild the query index from the event log. Returns the number of events replayed.
    pub fn rebuild_index(&mut self) -> Result<u64> {
        let tx = self.conn.transaction()?;
        let replayed = index::rebuild(&tx)?;
        tx.commit()?;
        Ok(replayed)
    }

    /// Record the chain height the journal is current with.
    pub fn set_chain_height(&self, height: u64) -> Result<()> {
        settings::set(&self.conn, "chain_height", &height.to_string())
    }

    /// Chain height the journal is current with, 0 when never set.
    pub fn chain_height(&self) -> Result<u64> {
        settings::get_u64(&self.conn, "chain_height", 0)
    }

    /// Sequence number of the last journaled event, 0 when empty.
    pub fn last_seq(&self) -> Result<u64> {
        events::last_seq(&self.conn)
    }

    /// Up to `limit` events with a sequence number above `after`.
    pub fn since(&self, after: u64, limit: u32) -> Result<Vec<EventRecord>> {
        events::since(&self.conn, after, limit)
    }

    /// All events of one query, oldest first.
    pub fn history(&self, query_id: QueryId) -> Result<Vec<EventRecord>> {
        events::for_query(&self.conn, query_id)
    }

    /// Indexed state of one query.
    ///
    /// # Errors
    ///
    /// - [`DbError::NotFound`](crate::DbError::NotFound) if the query was never journaled
    pub fn query(&self, query_id: QueryId) -> Result<QueryIndexRow> {
        index::get(&self.conn, query_id)
    }

    /// Indexed queries posted by `requester`.
    pub fn by_requester(&self, requester: &Address) -> Result<Vec<QueryIndexRow>> {
        index::by_requester(&self.conn, requester)
    }

    /// Underlying connection, for ad hoc reads.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbError;
    use wrb_types::BoardEvent;

    fn posted(seq: u64, query_id: QueryId) -> EventRecord {
        EventRecord {
            seq,
            block: seq,
            timestamp: 100 + seq,
            event: BoardEvent::QueryPosted {
                query_id,
                requester: Address::repeat(0xAA),
                reward: 10,
                base_fee: 1,
            },
        }
    }

    #[test]
    fn test_record_is_atomic() {
        let mut journal = Journal::open_memory().expect("journal");
        journal.record(&[posted(1, 1)]).expect("record");

        // Second record is out of order: neither lands.
        let result = journal.record(&[posted(2, 2), posted(4, 3)]);
        assert!(matches!(result, Err(DbError::OutOfOrder { .. })));
        assert_eq!(journal.last_seq().expect("seq"), 1);
        assert!(matches!(journal.query(2), Err(DbError::NotFound(_))));
        assert_eq!(
            settings::get_u64(journal.connection(), "indexed_seq", 0).expect("cursor"),
            1
        );
    }

    #[test]
    fn test_reset_and_rebuild() {
        let mut journal = Journal::open_memory().expect("journal");
        journal.record(&[posted(1, 1), posted(2, 2)]).expect("record");
        journal.set_chain_height(2).expect("height");
        assert_eq!(journal.rebuild_index().expect("rebuild"), 2);
        assert_eq!(journal.by_requester(&Address::repeat(0xAA)).expect("rows").len(), 2);

        journal.reset().expect("reset");
        assert_eq!(journal.last_seq().expect("seq"), 0);
        assert_eq!(journal.chain_height().expect("height"), 0);
        journal.record(&[posted(1, 1)]).expect("fresh start");
        assert_eq!(journal.history(1).expect("history").len(), 1);
    }
}
