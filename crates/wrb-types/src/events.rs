//! Canonical board events.
//!
//! Events form the append-only audit log of the board. Indexers rebuild the
//! full history of every query from them.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::{Address, Amount, Bytes, QueryId};

/// An event emitted by a mutating board operation.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoardEvent {
    QueryPosted {
        query_id: QueryId,
        requester: Address,
        /// Value paid with the post, escrowed in full as reward.
        reward: Amount,
        /// Minimum fee the post had to cover.
        base_fee: Amount,
    },
    QueryRewardUpgraded {
        query_id: QueryId,
        from: Address,
        value: Amount,
        reward: Amount,
    },
    QueryReported {
        query_id: QueryId,
        reporter: Address,
        timestamp: u64,
    },
    ResponseDelivered {
        query_id: QueryId,
        #[serde_as(as = "serde_with::hex::Hex")]
        payload: Bytes,
        callback_gas_used: u64,
    },
    ResponseDeliveryFailed {
        query_id: QueryId,
        #[serde_as(as = "serde_with::hex::Hex")]
        payload: Bytes,
        callback_gas_used: u64,
        reason: String,
    },
    BatchReportError {
        query_id: QueryId,
        reason: String,
    },
    QueryPurged {
        query_id: QueryId,
        requester: Address,
        refund: Amount,
    },
    ReportersSet {
        reporters: Vec<Address>,
    },
    ReportersUnset {
        reporters: Vec<Address>,
    },
    OwnershipTransferStarted {
        from: Address,
        to: Address,
    },
    OwnershipTransferred {
        from: Option<Address>,
        to: Address,
    },
}

impl BoardEvent {
    /// Event name as used by indexers and event filters.
    pub fn name(&self) -> &'static str {
        match self {
            BoardEvent::QueryPosted { .. } => "QueryPosted",
            BoardEvent::QueryRewardUpgraded { .. } => "QueryRewardUpgraded",
            BoardEvent::QueryReported { .. } => "QueryReported",
            BoardEvent::ResponseDelivered { .. } => "ResponseDelivered",
            BoardEvent::ResponseDeliveryFailed { .. } => "ResponseDeliveryFailed",
            BoardEvent::BatchReportError { .. } => "BatchReportError",
            BoardEvent::QueryPurged { .. } => "QueryPurged",
            BoardEvent::ReportersSet { .. } => "ReportersSet",
            BoardEvent::ReportersUnset { .. } => "ReportersUnset",
            BoardEvent::OwnershipTransferStarted { .. } => "OwnershipTransferStarted",
            BoardEvent::OwnershipTransferred { .. } => "OwnershipTransferred",
        }
    }

    /// The query this event concerns, if any.
    pub fn query_id(&self) -> Option<QueryId> {
        match self {
            BoardEvent::QueryPosted { query_id, .. }
            | BoardEvent::QueryRewardUpgraded { query_id, .. }
            | BoardEvent::QueryReported { query_id, .. }
            | BoardEvent::ResponseDelivered { query_id, .. }
            | BoardEvent::ResponseDeliveryFailed { query_id, .. }
            | BoardEvent::BatchReportError { query_id, .. }
            | BoardEvent::QueryPurged { query_id, .. } => Some(*query_id),
            BoardEvent::ReportersSet { .. }
            | BoardEvent::ReportersUnset { .. }
            | BoardEvent::OwnershipTransferStarted { .. }
            | BoardEvent::OwnershipTransferred { .. } => None,
        }
    }
}

/// An event together with its position in the log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, starting at 1.
    pub seq: u64,
    pub block: u64,
    pub timestamp: u64,
    pub event: BoardEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        let event = BoardEvent::QueryPosted {
            query_id: 1,
            requester: Address::repeat(1),
            reward: 100,
            base_fee: 10,
        };
        assert_eq!(event.name(), "QueryPosted");
        assert_eq!(event.query_id(), Some(1));

        let event = BoardEvent::ReportersSet {
            reporters: vec![Address::repeat(2)],
        };
        assert_eq!(event.name(), "ReportersSet");
        assert_eq!(event.query_id(), None);
    }

    #[test]
    fn test_event_json_shape() {
        let event = BoardEvent::ResponseDeliveryFailed {
            query_id: 7,
            payload: vec![0xD8, 0x27],
            callback_gas_used: 500,
            reason: "exceeded gas limit".to_string(),
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["ResponseDeliveryFailed"]["payload"], "d827");
        let back: BoardEvent = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, event);
    }
}
