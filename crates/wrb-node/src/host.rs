//! The board together with the collaborators it runs against.

use wrb_board::{
    BoardError, Env, InMemoryRegistry, PaymentError, RequestBoard, TxContext,
};
use wrb_feeds::{FeedError, FeedRouter, PriceFeed};
use wrb_types::{Address, Amount, EventRecord, QueryDefinition, QueryId};

use crate::chain::LocalChain;
use crate::config::NodeConfig;

/// Errors raised while executing a transaction on the host.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error(transparent)]
    Board(#[from] BoardError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Feed(#[from] FeedError),
}

/// Outcome of a committed transaction.
#[derive(Debug)]
pub struct Receipt<T> {
    pub output: T,
    pub tx: TxContext,
    /// Events emitted by the transaction, in order.
    pub events: Vec<EventRecord>,
}

pub struct Host {
    pub board: RequestBoard,
    pub registry: InMemoryRegistry,
    pub feeds: FeedRouter,
    pub chain: LocalChain,
}

impl Host {
    /// Deploy the board at genesis, authorize the configured reporters and
    /// register and fund the hosted feeds.
    pub fn genesis(config: &NodeConfig, genesis_time: u64) -> Result<Self, HostError> {
        let mut chain = LocalChain::genesis(&config.chain, genesis_time)?;
        let deploy = chain.genesis_tx(config.chain.genesis_owner);
        let mut board = RequestBoard::new(config.board.clone(), &deploy)?;
        if !config.chain.reporters.is_empty() {
            board.set_reporters(&deploy, &config.chain.reporters)?;
        }

        let mut registry = InMemoryRegistry::new();
        let mut feeds = FeedRouter::new();
        for feed_config in &config.feeds {
            let rad_hash =
                registry.verify_and_register(&feed_config.bytecode, feed_config.max_result_size);
            let feed = PriceFeed::new(feed_config.clone(), QueryDefinition::Verified(rad_hash))?;
            let address = feeds.add(feed)?;
            chain.faucet(address, config.chain.feed_funding)?;
        }

        Ok(Self {
            board,
            registry,
            feeds,
            chain,
        })
    }

    /// Run `op` as one transaction from `caller` carrying `value`.
    ///
    /// The value moves into custody first. If `op` fails the board has
    /// already undone its own changes; the balances and the hosted feeds
    /// are restored here, so a feed never keeps a delivery whose report was
    /// reverted.
    pub fn transact<T, F>(&mut self, caller: Address, value: Amount, op: F) -> Result<Receipt<T>, HostError>
    where
        F: FnOnce(&mut RequestBoard, &mut Env<'_>, &TxContext) -> wrb_board::Result<T>,
    {
        let Host {
            board,
            registry,
            feeds,
            chain,
        } = self;
        let first_seq = board.last_event_seq();
        let (tx, snapshot) = chain.begin(caller, value)?;
        let feeds_before = feeds.clone();
        let mut env = Env::new(&*registry, &mut *feeds, chain.balances_mut());
        match op(board, &mut env, &tx) {
            Ok(output) => Ok(Receipt {
                output,
                tx,
                events: board.events_since(first_seq).to_vec(),
            }),
            Err(e) => {
                chain.revert(snapshot);
                *feeds = feeds_before;
                tracing::debug!(%caller, block = tx.block, error = %e, "Transaction reverted");
                Err(e.into())
            }
        }
    }

    /// Post an update query for a hosted feed, paid from the feed account.
    pub fn request_feed_update(&mut self, caption: &str) -> Result<Receipt<QueryId>, HostError> {
        let feed = self.feeds.get(caption)?;
        let address = feed.address();
        let definition = feed.definition().clone();
        let sla = feed.sla();
        let callback_gas_limit = feed.callback_gas_limit();
        let fee = self
            .board
            .estimate_base_fee_with_callback(
                self.chain.gas_price(),
                sla.max_result_size,
                callback_gas_limit,
            )
            .max(1);

        let receipt = self.transact(address, fee, |board, env, tx| {
            board.post(env, tx, definition, sla, callback_gas_limit)
        })?;
        self.feeds.get_mut(caption)?.note_posted(receipt.output);
        Ok(receipt)
    }
}
