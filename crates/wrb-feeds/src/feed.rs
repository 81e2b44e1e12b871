//! A single price feed.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use wrb_board::{BoardView, CallResult, CallbackFault, Consumer, Delivery, GasMeter};
use wrb_codec::result::decode_value;
use wrb_codec::ResultError;
use wrb_types::{Address, QueryDefinition, QueryId, Sla};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::FeedConfig;
use crate::twap::{twap_since, MAX_OBSERVATIONS};
use crate::{FeedError, Result};

/// Gas charged for decoding a delivered price.
pub const DECODE_GAS: u64 = 5_000;

/// Gas charged for storing an accepted price.
pub const STORE_GAS: u64 = 20_000;

/// Gas charged for recording an error result.
pub const ERROR_GAS: u64 = 5_000;

/// An accepted price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub query_id: QueryId,
    /// Resolution time attested by the witnessing network.
    pub timestamp: u64,
    pub price: u64,
}

/// What a feed serves to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceReading {
    pub caption: String,
    pub decimals: u8,
    pub price: u64,
    pub timestamp: u64,
    pub query_id: QueryId,
    /// Average over the feed window, when enough observations exist.
    pub twap: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct PriceFeed {
    config: FeedConfig,
    address: Address,
    definition: QueryDefinition,
    observations: VecDeque<Observation>,
    breaker: CircuitBreaker,
    /// Update query the feed is waiting for.
    pending: Option<QueryId>,
    last_error: Option<ResultError>,
}

impl PriceFeed {
    /// Create a feed that posts `definition` on each update.
    pub fn new(config: FeedConfig, definition: QueryDefinition) -> Result<Self> {
        config.validate()?;
        let breaker = CircuitBreaker::new(config.staleness_threshold, config.max_consecutive_errors);
        Ok(Self {
            address: config.address(),
            config,
            definition,
            observations: VecDeque::new(),
            breaker,
            pending: None,
            last_error: None,
        })
    }

    /// Unique caption, e.g. `Price-ETH/USD-6`.
    pub fn caption(&self) -> &str {
        &self.config.caption
    }

    /// Account the feed posts from and is called back on.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Definition posted on each update.
    pub fn definition(&self) -> &QueryDefinition {
        &self.definition
    }

    pub fn sla(&self) -> Sla {
        self.config.sla()
    }

    /// Gas budget granted to each update callback.
    pub fn callback_gas_limit(&self) -> u64 {
        self.config.callback_gas_limit
    }

    /// Update query the feed is waiting for.
    pub fn pending(&self) -> Option<QueryId> {
        self.pending
    }

    /// Remember the update query just posted for this feed.
    pub fn note_posted(&mut self, query_id: QueryId) {
        if let Some(previous) = self.pending.replace(query_id) {
            tracing::debug!(caption = %self.config.caption, previous, query_id, "superseding pending update");
        }
    }

    /// Accepted prices, oldest first.
    pub fn observations(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    /// Last error result, kept until replaced.
    pub fn last_error(&self) -> Option<&ResultError> {
        self.last_error.as_ref()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Average price over the feed window ending at `now`.
    pub fn twap(&self, now: u64) -> Result<u64> {
        twap_since(&self.observations, now.saturating_sub(self.config.twap_window_secs))
    }

    /// The latest price, if the feed is operational at `now`.
    ///
    /// # Errors
    ///
    /// - [`FeedError::Paused`] or [`FeedError::StaleData`] from the breaker
    pub fn latest(&self, now: u64) -> Result<PriceReading> {
        self.breaker.check_operational(now)?;
        let last = self
            .observations
            .back()
            .ok_or(FeedError::InsufficientObservations {
                required: 1,
                available: 0,
            })?;
        Ok(PriceReading {
            caption: self.config.caption.clone(),
            decimals: self.config.decimals,
            price: last.price,
            timestamp: last.timestamp,
            query_id: last.query_id,
            twap: self.twap(now).ok(),
        })
    }

    fn check_delivery(&self, delivery: &Delivery<'_>, board: &BoardView<'_>) -> CallResult {
        if self.pending != Some(delivery.query_id) {
            return Err(CallbackFault::Reverted(format!(
                "unexpected query {}",
                delivery.query_id
            )));
        }
        match board.query(delivery.query_id) {
            Some(query) if query.request.requester == self.address => Ok(()),
            _ => Err(CallbackFault::Reverted(format!(
                "query {} was not posted by this feed",
                delivery.query_id
            ))),
        }
    }

    fn accept(&mut self, observation: Observation) -> Result<()> {
        if let Some(last) = self.observations.back() {
            if observation.timestamp <= last.timestamp {
                return Err(FeedError::NonMonotonicTimestamp {
                    new: observation.timestamp,
                    last: last.timestamp,
                });
            }
        }
        if self.observations.len() == MAX_OBSERVATIONS {
            self.observations.pop_front();
        }
        self.observations.push_back(observation);
        self.breaker.record_price(observation.timestamp);
        Ok(())
    }
}

impl Consumer for PriceFeed {
    fn report_result(
        &mut self,
        delivery: &Delivery<'_>,
        gas: &mut GasMeter,
        board: &BoardView<'_>,
    ) -> CallResult {
        gas.charge(DECODE_GAS)?;
        self.check_delivery(delivery, board)?;
        let price: u64 = decode_value(delivery.payload)
            .map_err(|e| CallbackFault::Reverted(format!("undecodable price: {e}")))?;
        gas.charge(STORE_GAS)?;
        self.accept(Observation {
            query_id: delivery.query_id,
            timestamp: delivery.timestamp,
            price,
        })
        .map_err(|e| CallbackFault::Reverted(e.to_string()))?;
        self.pending = None;
        tracing::info!(caption = %self.config.caption, price, timestamp = delivery.timestamp, "Price updated");
        Ok(())
    }

    fn report_error(
        &mut self,
        delivery: &Delivery<'_>,
        error: &ResultError,
        gas: &mut GasMeter,
        board: &BoardView<'_>,
    ) -> CallResult {
        gas.charge(ERROR_GAS)?;
        self.check_delivery(delivery, board)?;
        self.breaker.record_error();
        self.last_error = Some(error.clone());
        self.pending = None;
        tracing::warn!(caption = %self.config.caption, reason = %error.reason(), "Feed update resolved to an error");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wrb_board::store::QueryStore;
    use wrb_codec::{cbor, ResultErrorCode};
    use wrb_types::Request;

    fn feed() -> PriceFeed {
        PriceFeed::new(
            FeedConfig::new("Price-ETH/USD-6", vec![0x0A]),
            QueryDefinition::Verified([5; 32]),
        )
        .expect("feed")
    }

    fn store_with(feed: &PriceFeed, count: u64) -> QueryStore {
        let mut store = QueryStore::new();
        for _ in 0..count {
            let id = store.allocate_id().expect("id");
            store
                .put(
                    id,
                    Request {
                        requester: feed.address(),
                        reward: 1,
                        definition: feed.definition().clone(),
                        sla: feed.sla(),
                        callback_gas_limit: feed.callback_gas_limit(),
                    },
                    1,
                )
                .expect("put");
        }
        store
    }

    fn deliver(feed: &mut PriceFeed, store: &QueryStore, query_id: QueryId, timestamp: u64, payload: &[u8]) -> CallResult {
        let tally = [0xAB; 32];
        let delivery = Delivery {
            query_id,
            timestamp,
            tally_hash: &tally,
            finality_block: 2,
            payload,
        };
        let mut gas = GasMeter::new(feed.callback_gas_limit());
        feed.report_result(&delivery, &mut gas, &BoardView::new(store))
    }

    #[test]
    fn test_accepts_pending_update() {
        let mut feed = feed();
        let store = store_with(&feed, 2);
        feed.note_posted(1);
        let payload = cbor::to_vec(&1_850_250_000u64).expect("encode");
        deliver(&mut feed, &store, 1, 1_000, &payload).expect("accepted");

        let reading = feed.latest(1_010).expect("latest");
        assert_eq!(reading.price, 1_850_250_000);
        assert_eq!(reading.query_id, 1);
        assert_eq!(reading.twap, None);
        assert_eq!(feed.pending(), None);

        feed.note_posted(2);
        let payload = cbor::to_vec(&1_900_000_000u64).expect("encode");
        deliver(&mut feed, &store, 2, 2_000, &payload).expect("accepted");
        assert_eq!(feed.latest(2_000).expect("latest").twap, Some(1_850_250_000));
    }

    #[test]
    fn test_rejects_unexpected_query() {
        let mut feed = feed();
        let store = store_with(&feed, 1);
        let payload = cbor::to_vec(&1u64).expect("encode");
        let err = deliver(&mut feed, &store, 1, 1_000, &payload).expect_err("not pending");
        assert!(matches!(err, CallbackFault::Reverted(_)));
        assert_eq!(feed.observations().count(), 0);
    }

    #[test]
    fn test_rejects_undecodable_price() {
        let mut feed = feed();
        let store = store_with(&feed, 1);
        feed.note_posted(1);
        let payload = cbor::to_vec(&"not a price").expect("encode");
        let err = deliver(&mut feed, &store, 1, 1_000, &payload).expect_err("text");
        assert!(matches!(err, CallbackFault::Reverted(reason) if reason.starts_with("undecodable price")));
        assert_eq!(feed.pending(), Some(1));
    }

    #[test]
    fn test_runs_out_of_gas() {
        let mut feed = feed();
        let store = store_with(&feed, 1);
        feed.note_posted(1);
        let tally = [0xAB; 32];
        let payload = cbor::to_vec(&7u64).expect("encode");
        let delivery = Delivery {
            query_id: 1,
            timestamp: 1_000,
            tally_hash: &tally,
            finality_block: 2,
            payload: &payload,
        };
        let mut gas = GasMeter::new(DECODE_GAS + STORE_GAS - 1);
        let err = feed
            .report_result(&delivery, &mut gas, &BoardView::new(&store))
            .expect_err("out of gas");
        assert_eq!(err, CallbackFault::OutOfGas);
        assert_eq!(feed.observations().count(), 0);
    }

    #[test]
    fn test_error_results_trip_breaker() {
        let mut feed = PriceFeed::new(
            FeedConfig {
                max_consecutive_errors: 2,
                ..FeedConfig::new("Price-BTC/USD-6", vec![0x0A])
            },
            QueryDefinition::Verified([5; 32]),
        )
        .expect("feed");
        let store = store_with(&feed, 2);
        let tally = [0xAB; 32];
        let error = ResultError {
            code: ResultErrorCode::InsufficientConsensus,
            raw_code: Some(0x51),
            context: Vec::new(),
        };
        for id in 1..=2 {
            feed.note_posted(id);
            let delivery = Delivery {
                query_id: id,
                timestamp: 1_000 + id,
                tally_hash: &tally,
                finality_block: 2,
                payload: &[0xD8, 0x27],
            };
            let mut gas = GasMeter::new(feed.callback_gas_limit());
            feed.report_error(&delivery, &error, &mut gas, &BoardView::new(&store))
                .expect("recorded");
        }
        assert!(matches!(feed.latest(1_010), Err(FeedError::Paused(2))));
        assert_eq!(
            feed.last_error().map(|e| e.code),
            Some(ResultErrorCode::InsufficientConsensus)
        );
    }
}
