//! Query records: the request posted by a requester and the response
//! delivered by a reporter.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::{Address, Amount, Bytes, RadHash, TallyHash};

/// Witnessing commitment required from the witnessing network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sla {
    /// Number of witnesses that must take part in resolving the query.
    pub committee_size: u8,
    /// Reward paid to each witness, in nanowits.
    pub witness_reward: u64,
    /// Upper bound on the encoded result size, in bytes.
    pub max_result_size: u16,
}

impl Sla {
    /// Total fee paid to the witnessing committee, in nanowits.
    pub fn witnessing_fee(&self) -> u64 {
        self.witness_reward
            .saturating_mul(u64::from(self.committee_size))
    }
}

/// Reference to the data query a request asks to be resolved.
///
/// Either a content hash already verified by the registry or raw bytecode
/// that has not been verified. A request carries exactly one of them.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryDefinition {
    Verified(#[serde_as(as = "serde_with::hex::Hex")] RadHash),
    Bytecode(#[serde_as(as = "serde_with::hex::Hex")] Bytes),
}

impl QueryDefinition {
    /// Content hash of a verified definition.
    pub fn rad_hash(&self) -> Option<&RadHash> {
        match self {
            QueryDefinition::Verified(hash) => Some(hash),
            QueryDefinition::Bytecode(_) => None,
        }
    }

    /// Raw bytecode of an unverified definition.
    pub fn bytecode(&self) -> Option<&[u8]> {
        match self {
            QueryDefinition::Verified(_) => None,
            QueryDefinition::Bytecode(bytes) => Some(bytes),
        }
    }
}

/// The requester's half of a query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub requester: Address,
    /// Escrowed reward. Non-zero only while the query is posted.
    pub reward: Amount,
    pub definition: QueryDefinition,
    pub sla: Sla,
    /// Zero means no callback was requested.
    pub callback_gas_limit: u64,
}

impl Request {
    /// Whether the requester asked for callback delivery.
    pub fn wants_callback(&self) -> bool {
        self.callback_gas_limit > 0
    }
}

/// Outcome of the callback dispatched when the response was delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackReceipt {
    pub succeeded: bool,
    pub gas_used: u64,
}

/// The reporter's half of a query.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub reporter: Address,
    /// Resolution time attested by the witnessing network (Unix seconds).
    pub timestamp: u64,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub tally_hash: TallyHash,
    /// CBOR-encoded result. Empty once handed over through a callback.
    #[serde_as(as = "serde_with::hex::Hex")]
    pub payload: Bytes,
    /// Block at which the delivery finalized.
    pub finality_block: u64,
    /// Present only when a callback was attempted.
    pub callback: Option<CallbackReceipt>,
}

/// A stored query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub request: Request,
    pub response: Option<Response>,
    /// Block at which the query was posted.
    pub posted_block: u64,
}

/// Lifecycle status of a query, always derived from stored facts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    /// The identifier was never issued.
    Unknown,
    /// Issued, but the entry was purged after a terminal read.
    Void,
    /// Awaiting a report.
    Posted,
    /// Response written, payload kept in storage.
    Reported,
    /// Callback succeeded; payload discarded.
    Delivered,
    /// Callback failed; payload discarded.
    Undeliverable,
}

impl QueryStatus {
    /// Whether a requester may fetch-and-purge a query in this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueryStatus::Reported | QueryStatus::Delivered | QueryStatus::Undeliverable
        )
    }
}

impl std::fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QueryStatus::Unknown => "unknown",
            QueryStatus::Void => "void",
            QueryStatus::Posted => "posted",
            QueryStatus::Reported => "reported",
            QueryStatus::Delivered => "delivered",
            QueryStatus::Undeliverable => "undeliverable",
        };
        f.write_str(name)
    }
}
