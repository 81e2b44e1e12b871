//! Append-only event log.

use wrb_types::{BoardEvent, EventRecord};

/// Events emitted by the board, in order.
#[derive(Debug, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `event`, returning its sequence number.
    pub fn emit(&mut self, block: u64, timestamp: u64, event: BoardEvent) -> u64 {
        let seq = self.records.len() as u64 + 1;
        tracing::debug!(seq, event = event.name(), query_id = ?event.query_id(), "board event");
        self.records.push(EventRecord {
            seq,
            block,
            timestamp,
            event,
        });
        seq
    }

    /// All records, oldest first.
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Records with a sequence number greater than `seq`.
    pub fn since(&self, seq: u64) -> &[EventRecord] {
        let start = usize::try_from(seq)
            .unwrap_or(usize::MAX)
            .min(self.records.len());
        &self.records[start..]
    }

    /// Sequence number of the last record, zero when empty.
    pub fn last_seq(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record appended after the log held `len` records.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }
}
