//! # wrb-node
//!
//! Single-process host for the request board.
//!
//! The node owns a local development chain (balances, blocks, clock), the
//! deployed board, the query definition registry and the hosted price feeds.
//! Clients talk to it via JSON-RPC over a Unix socket. Transactions are
//! serialized through one lock; committed events are journaled to SQLite and
//! broadcast to subscribers.

pub mod chain;
pub mod commands;
pub mod config;
pub mod events;
pub mod host;
pub mod rpc;

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{error, warn};
use wrb_board::{Env, RequestBoard, TxContext};
use wrb_db::Journal;
use wrb_types::{Address, Amount, EventRecord};

use crate::config::NodeConfig;
use crate::events::EventBus;
use crate::host::{Host, Receipt};
use crate::rpc::RpcError;

/// Subscriber buffer size.
pub const EVENT_BUFFER: usize = 1000;

/// Node-wide shared state.
pub struct NodeState {
    /// Board, registry, feeds and chain. Holding this lock is holding the
    /// chain: one transaction at a time.
    pub host: Mutex<Host>,
    /// Event journal, when enabled.
    pub journal: Option<Mutex<Journal>>,
    pub config: NodeConfig,
    pub event_bus: EventBus,
    pub shutdown_tx: broadcast::Sender<()>,
}

impl NodeState {
    /// Build the node at genesis. An existing journal is reset, since the
    /// chain starts over.
    pub fn new(
        config: NodeConfig,
        mut journal: Option<Journal>,
        genesis_time: u64,
    ) -> anyhow::Result<Arc<Self>> {
        config.validate()?;
        let host = Host::genesis(&config, genesis_time)?;
        if let Some(journal) = journal.as_mut() {
            journal.reset()?;
            journal.record(host.board.events())?;
        }
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Arc::new(Self {
            host: Mutex::new(host),
            journal: journal.map(Mutex::new),
            config,
            event_bus: EventBus::new(EVENT_BUFFER),
            shutdown_tx,
        }))
    }

    /// Execute one board transaction and publish its events.
    ///
    /// # Errors
    ///
    /// Returns the [`RpcError`] mapped from the failing board, payment or
    /// feed operation. A failed transaction publishes nothing.
    pub async fn execute<T, F>(&self, caller: Address, value: Amount, op: F) -> Result<Receipt<T>, RpcError>
    where
        F: FnOnce(&mut RequestBoard, &mut Env<'_>, &TxContext) -> wrb_board::Result<T>,
    {
        let mut host = self.host.lock().await;
        let receipt = host.transact(caller, value, op)?;
        self.publish(&host, &receipt.events, receipt.tx.block).await;
        Ok(receipt)
    }

    /// Journal and broadcast committed events.
    ///
    /// The journal is brought up to the board's log rather than fed
    /// `records` alone, so events left behind by an earlier failed write are
    /// journaled in order on the next commit. Subscribers only receive
    /// `records`.
    ///
    /// Takes the locked host so journal order matches commit order.
    pub async fn publish(&self, host: &Host, records: &[EventRecord], height: u64) {
        if let Some(journal) = &self.journal {
            let mut journal = journal.lock().await;
            let result = journal.last_seq().and_then(|journaled| {
                let backlog = host.board.events_since(journaled);
                if backlog.len() > records.len() {
                    warn!(
                        journaled,
                        backlog = backlog.len(),
                        "Journal behind the board, catching up"
                    );
                }
                journal.record(backlog)?;
                journal.set_chain_height(height)
            });
            if let Err(e) = result {
                error!(height, "Failed to journal events: {}", e);
            }
        }
        for record in records {
            self.event_bus.emit(record.clone());
        }
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::GenesisBalance;
    use wrb_feeds::FeedConfig;

    pub const OWNER: Address = Address::repeat(0x01);
    pub const REPORTER: Address = Address::repeat(0x02);
    pub const REQUESTER: Address = Address::repeat(0xAA);
    pub const CAPTION: &str = "Price-ETH/USD-6";

    pub fn node() -> Arc<NodeState> {
        let mut config = NodeConfig::default();
        config.chain.balances = vec![GenesisBalance {
            address: REQUESTER,
            amount: 1_000_000_000,
        }];
        config.feeds = vec![FeedConfig::new(CAPTION, vec![0x0A, 0x0B])];
        let journal = Journal::open_memory().expect("journal");
        NodeState::new(config, Some(journal), 1_700_000_000).expect("node")
    }
}
