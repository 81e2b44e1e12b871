//! Process-wide board state.
//!
//! Created once at initialization and handed to every operation. A mutating
//! operation runs inside [`BoardState::atomically`]: on error every change it
//! made to the store, the ACL, the ledger and the event log is undone.

use wrb_types::Address;

use crate::acl::AccessControl;
use crate::escrow::EscrowLedger;
use crate::events::EventLog;
use crate::store::QueryStore;
use crate::Result;

/// Query Store, ACL, Escrow Ledger and event log.
#[derive(Debug)]
pub struct BoardState {
    pub store: QueryStore,
    pub acl: AccessControl,
    pub escrow: EscrowLedger,
    pub events: EventLog,
}

/// What is needed to undo an operation.
#[derive(Debug)]
pub struct Checkpoint {
    acl: AccessControl,
    escrow: EscrowLedger,
    events_len: usize,
}

impl BoardState {
    /// Fresh state for a board owned by `owner`.
    pub fn new(owner: Address) -> Self {
        Self {
            store: QueryStore::new(),
            acl: AccessControl::new(owner),
            escrow: EscrowLedger::new(),
            events: EventLog::new(),
        }
    }

    /// Start a transaction. Store writes are journaled until commit or revert.
    pub fn checkpoint(&mut self) -> Checkpoint {
        self.store.begin();
        Checkpoint {
            acl: self.acl.clone(),
            escrow: self.escrow,
            events_len: self.events.len(),
        }
    }

    /// Keep everything done since `checkpoint`.
    pub fn commit(&mut self, _checkpoint: Checkpoint) {
        self.store.commit();
    }

    /// Undo everything done since `checkpoint`.
    pub fn revert(&mut self, checkpoint: Checkpoint) {
        self.store.rollback();
        self.acl = checkpoint.acl;
        self.escrow = checkpoint.escrow;
        self.events.truncate(checkpoint.events_len);
    }

    /// Run `op`, keeping its effects only if it succeeds.
    pub fn atomically<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let checkpoint = self.checkpoint();
        match op(self) {
            Ok(value) => {
                self.commit(checkpoint);
                Ok(value)
            }
            Err(err) => {
                tracing::debug!(error = %err, "reverting board operation");
                self.revert(checkpoint);
                Err(err)
            }
        }
    }
}
