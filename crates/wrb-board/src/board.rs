//! Query Lifecycle Facade.
//!
//! [`RequestBoard`] is the externally callable surface. Mutating operations
//! run atomically: an error undoes every change the operation made, payments
//! included, since the single payment of an operation is always its last step.

use tracing::info;
use wrb_codec::ResultError;
use wrb_types::{
    Address, Amount, BoardEvent, EventRecord, Query, QueryDefinition, QueryId, QueryStatus,
    Request, Response, Sla,
};

use crate::config::BoardConfig;
use crate::escrow::{self, GasPricing, PricingPolicy};
use crate::host::{Env, TxContext};
use crate::reporting::{self, ReportEntry};
use crate::state::BoardState;
use crate::{posting, BoardError, Result};

/// The witness request board.
#[derive(Debug)]
pub struct RequestBoard<P: PricingPolicy = GasPricing> {
    config: BoardConfig,
    pricing: P,
    state: BoardState,
}

impl RequestBoard<GasPricing> {
    /// Deploy a board priced by the gas constants in `config`. The caller of
    /// `deploy` becomes the owner.
    pub fn new(config: BoardConfig, deploy: &TxContext) -> Result<Self> {
        let pricing = config.pricing;
        Self::with_pricing(config, pricing, deploy)
    }
}

impl<P: PricingPolicy> RequestBoard<P> {
    /// Deploy a board with a custom pricing policy.
    ///
    /// # Errors
    ///
    /// - [`BoardError::InvalidConfig`] if `config` is inconsistent
    /// - [`BoardError::ZeroAddress`] if the deployer is the zero address
    pub fn with_pricing(config: BoardConfig, pricing: P, deploy: &TxContext) -> Result<Self> {
        config.validate()?;
        if deploy.caller.is_zero() {
            return Err(BoardError::ZeroAddress);
        }
        let mut state = BoardState::new(deploy.caller);
        state.events.emit(
            deploy.block,
            deploy.timestamp,
            BoardEvent::OwnershipTransferred {
                from: None,
                to: deploy.caller,
            },
        );
        info!(owner = %deploy.caller, "Request board deployed");
        Ok(Self {
            config,
            pricing,
            state,
        })
    }

    /// Policy bounds the board was deployed with.
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Pricing policy used for minimum rewards.
    pub fn pricing(&self) -> &P {
        &self.pricing
    }

    // ---- Requesters ----

    /// Post a query paid with `tx.value`. Returns its identifier.
    pub fn post(
        &mut self,
        env: &mut Env<'_>,
        tx: &TxContext,
        definition: QueryDefinition,
        sla: Sla,
        callback_gas_limit: u64,
    ) -> Result<QueryId> {
        let config = &self.config;
        let pricing = &self.pricing;
        self.state.atomically(|state| {
            posting::post(
                state,
                config,
                pricing,
                env,
                tx,
                definition,
                sla,
                callback_gas_limit,
            )
        })
    }

    /// Add `tx.value` to the reward of a posted query. Returns the new reward.
    pub fn upgrade_reward(&mut self, tx: &TxContext, query_id: QueryId) -> Result<Amount> {
        self.state
            .atomically(|state| posting::upgrade_reward(state, tx, query_id))
    }

    /// Purge a query and return its response. Only the requester may fetch,
    /// once the query is terminal or has expired unreported; any residual
    /// reward is refunded to the requester.
    ///
    /// # Errors
    ///
    /// - [`BoardError::UnknownQuery`] if the query was never posted or is purged
    /// - [`BoardError::Unauthorized`] if the caller is not the requester
    /// - [`BoardError::NotFetchable`] if the query is posted and not expired
    pub fn fetch_query_response(&mut self, env: &mut Env<'_>, tx: &TxContext, query_id: QueryId) -> Result<Response> {
        let config = &self.config;
        self.state.atomically(|state| {
            let status = state.store.status(query_id);
            let query = match status {
                QueryStatus::Unknown | QueryStatus::Void => {
                    return Err(BoardError::UnknownQuery(query_id))
                }
                _ => state.store.query(query_id)?,
            };
            if query.request.requester != tx.caller {
                return Err(BoardError::Unauthorized {
                    caller: tx.caller,
                    reason: "not the requester",
                });
            }
            let expired =
                status == QueryStatus::Posted && config.is_expired(query.posted_block, tx.block);
            if !status.is_terminal() && !expired {
                return Err(BoardError::NotFetchable { query_id, status });
            }

            let query = state.store.erase(query_id)?;
            let refund = query.request.reward;
            state.escrow.refund(refund)?;
            state.events.emit(
                tx.block,
                tx.timestamp,
                BoardEvent::QueryPurged {
                    query_id,
                    requester: tx.caller,
                    refund,
                },
            );
            if refund > 0 {
                env.payments.transfer(tx.caller, refund)?;
            }
            info!(query_id, %status, refund = %refund, "Query purged");
            Ok(query.response.unwrap_or_default())
        })
    }

    // ---- Reporters ----

    /// Report one result. Returns the reward paid to the caller.
    pub fn report(&mut self, env: &mut Env<'_>, tx: &TxContext, entry: ReportEntry) -> Result<Amount> {
        self.state
            .atomically(|state| reporting::report(state, env, tx, entry))
    }

    /// Report a batch of results. Returns the total reward paid to the caller.
    pub fn report_batch(
        &mut self,
        env: &mut Env<'_>,
        tx: &TxContext,
        entries: Vec<ReportEntry>,
        verbose: bool,
    ) -> Result<Amount> {
        self.state
            .atomically(|state| reporting::report_batch(state, env, tx, entries, verbose))
    }

    // ---- Owner ----

    /// Authorize `reporters`.
    ///
    /// # Errors
    ///
    /// - [`BoardError::Unauthorized`] if the caller is not the owner
    /// - [`BoardError::ZeroAddress`] if any entry is the zero address
    pub fn set_reporters(&mut self, tx: &TxContext, reporters: &[Address]) -> Result<()> {
        self.state.atomically(|state| {
            let event = state.acl.set_reporters(&tx.caller, reporters)?;
            state.events.emit(tx.block, tx.timestamp, event);
            info!(count = reporters.len(), "Reporters set");
            Ok(())
        })
    }

    /// Revoke `reporters`. Unknown addresses are ignored.
    ///
    /// # Errors
    ///
    /// - [`BoardError::Unauthorized`] if the caller is not the owner
    pub fn unset_reporters(&mut self, tx: &TxContext, reporters: &[Address]) -> Result<()> {
        self.state.atomically(|state| {
            let event = state.acl.unset_reporters(&tx.caller, reporters)?;
            state.events.emit(tx.block, tx.timestamp, event);
            info!(count = reporters.len(), "Reporters unset");
            Ok(())
        })
    }

    /// Propose `new_owner`. The transfer completes on [`accept_ownership`](Self::accept_ownership).
    pub fn transfer_ownership(&mut self, tx: &TxContext, new_owner: Address) -> Result<()> {
        self.state.atomically(|state| {
            let event = state.acl.transfer_ownership(&tx.caller, new_owner)?;
            state.events.emit(tx.block, tx.timestamp, event);
            Ok(())
        })
    }

    /// Complete a proposed ownership transfer.
    ///
    /// # Errors
    ///
    /// - [`BoardError::Unauthorized`] if the caller is not the proposed owner
    pub fn accept_ownership(&mut self, tx: &TxContext) -> Result<()> {
        self.state.atomically(|state| {
            let event = state.acl.accept_ownership(&tx.caller)?;
            state.events.emit(tx.block, tx.timestamp, event);
            info!(owner = %tx.caller, "Ownership transferred");
            Ok(())
        })
    }

    // ---- Reads ----

    /// Status derived from the stored query. Purged and unknown ids are `Unknown`.
    pub fn query_status(&self, query_id: QueryId) -> QueryStatus {
        self.state.store.status(query_id)
    }

    /// Statuses of `query_ids`, in the given order.
    pub fn query_statuses(&self, query_ids: &[QueryId]) -> Vec<QueryStatus> {
        query_ids.iter().map(|id| self.query_status(*id)).collect()
    }

    /// # Errors
    ///
    /// - [`BoardError::UnknownQuery`] if the query was never posted or is purged
    pub fn query(&self, query_id: QueryId) -> Result<&Query> {
        self.state.store.query(query_id)
    }

    /// The request of a stored query.
    ///
    /// # Errors
    ///
    /// - [`BoardError::UnknownQuery`] if the query was never posted or is purged
    pub fn query_request(&self, query_id: QueryId) -> Result<&Request> {
        Ok(&self.query(query_id)?.request)
    }

    /// The stored response, or `None` while the query is posted.
    pub fn query_response(&self, query_id: QueryId) -> Result<Option<&Response>> {
        Ok(self.query(query_id)?.response.as_ref())
    }

    /// Decode the error report stored for a reported query.
    ///
    /// # Errors
    ///
    /// - [`BoardError::UnknownQuery`] if the query does not exist
    /// - [`BoardError::InvalidResult`] if no payload is stored
    /// - [`BoardError::Codec`] if the payload is not an error report
    pub fn query_result_error(&self, query_id: QueryId) -> Result<ResultError> {
        let payload = self
            .query_response(query_id)?
            .map(|response| response.payload.as_slice())
            .unwrap_or_default();
        if payload.is_empty() {
            return Err(BoardError::InvalidResult(format!(
                "no payload stored for query {query_id}"
            )));
        }
        Ok(wrb_codec::decode_error(payload)?)
    }

    /// Identifier the next posted query will receive.
    pub fn next_query_id(&self) -> QueryId {
        self.state.store.next_id()
    }

    /// Minimum reward for a query without callback.
    pub fn estimate_base_fee(&self, gas_price: u128, result_size: u16) -> Amount {
        self.pricing.base_fee(gas_price, result_size)
    }

    /// Minimum reward for a query delivered by callback under `callback_gas_limit`.
    pub fn estimate_base_fee_with_callback(
        &self,
        gas_price: u128,
        result_size: u16,
        callback_gas_limit: u64,
    ) -> Amount {
        self.pricing
            .base_fee_with_callback(gas_price, result_size, callback_gas_limit)
    }

    /// `(revenue, expense)` of reporting `query_ids` at the given prices.
    pub fn estimate_report_earnings(
        &self,
        query_ids: &[QueryId],
        gas_price: u128,
        nanowit_price: u128,
    ) -> (Amount, Amount) {
        escrow::estimate_report_earnings(
            &self.state.store,
            &self.pricing,
            query_ids,
            gas_price,
            nanowit_price,
        )
    }

    /// Current owner.
    pub fn owner(&self) -> Address {
        self.state.acl.owner()
    }

    /// Proposed owner awaiting acceptance.
    pub fn pending_owner(&self) -> Option<Address> {
        self.state.acl.pending_owner()
    }

    /// Whether `address` may report results.
    pub fn is_reporter(&self, address: &Address) -> bool {
        self.state.acl.is_reporter(address)
    }

    /// Whether `address` may upgrade the board. Only the owner can.
    pub fn is_upgradable_from(&self, address: &Address) -> bool {
        self.state.acl.is_upgradable_from(address)
    }

    /// Total value currently escrowed.
    pub fn escrow_held(&self) -> Amount {
        self.state.escrow.held()
    }

    /// Check the escrow total against the stored rewards.
    pub fn audit_escrow(&self) -> Result<()> {
        self.state.escrow.audit(&self.state.store)
    }

    /// Every event emitted so far.
    pub fn events(&self) -> &[EventRecord] {
        self.state.events.records()
    }

    /// Events with a sequence number greater than `seq`.
    pub fn events_since(&self, seq: u64) -> &[EventRecord] {
        self.state.events.since(seq)
    }

    /// Sequence number of the last emitted event, 0 before any.
    pub fn last_event_seq(&self) -> u64 {
        self.state.events.last_seq()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{BoardView, CallResult, CallbackFault, Consumer, Consumers, Delivery, GasMeter};
    use crate::host::{Balances, PaymentError, PaymentGateway};
    use crate::registry::InMemoryRegistry;
    use std::sync::{Arc, Mutex};
    use wrb_codec::{ResultErrorCode, ResultKind};

    const OWNER: Address = Address::repeat(0xAA);
    const REQUESTER: Address = Address::repeat(0x01);
    const REPORTER: Address = Address::repeat(0x02);
    const STRANGER: Address = Address::repeat(0x03);
    const NOW: u64 = 1_700_000_000;

    #[derive(Clone, Copy)]
    enum Behavior {
        Accept,
        Revert,
        Burn,
    }

    #[derive(Default)]
    struct Seen {
        kinds: Vec<ResultKind>,
        errors: Vec<ResultErrorCode>,
        /// (status, reward) of the delivered query observed mid-callback.
        observed: Vec<(QueryStatus, Amount)>,
    }

    struct Recorder {
        behavior: Behavior,
        seen: Arc<Mutex<Seen>>,
    }

    impl Recorder {
        fn run(&self, gas: &mut GasMeter) -> CallResult {
            match self.behavior {
                Behavior::Accept => gas.charge(21_000),
                Behavior::Revert => {
                    gas.charge(5_000)?;
                    Err(CallbackFault::Reverted("price out of range".to_string()))
                }
                Behavior::Burn => loop {
                    gas.charge(10_000)?;
                },
            }
        }

        fn observe(&self, delivery: &Delivery<'_>, board: &BoardView<'_>, kind: ResultKind, code: Option<ResultErrorCode>) {
            if let Ok(mut seen) = self.seen.lock() {
                seen.kinds.push(kind);
                seen.errors.extend(code);
                seen.observed
                    .push((board.status(delivery.query_id), board.reward(delivery.query_id)));
            }
        }
    }

    /// Records every transfer before passing it on.
    struct CountingPayments<'a> {
        inner: &'a mut Balances,
        transfers: Vec<(Address, Amount)>,
    }

    impl<'a> CountingPayments<'a> {
        fn new(inner: &'a mut Balances) -> Self {
            Self {
                inner,
                transfers: Vec::new(),
            }
        }
    }

    impl PaymentGateway for CountingPayments<'_> {
        fn transfer(&mut self, to: Address, amount: Amount) -> std::result::Result<(), PaymentError> {
            self.transfers.push((to, amount));
            self.inner.transfer(to, amount)
        }
    }

    impl Consumer for Recorder {
        fn report_result(&mut self, delivery: &Delivery<'_>, gas: &mut GasMeter, board: &BoardView<'_>) -> CallResult {
            self.observe(delivery, board, ResultKind::Value, None);
            self.run(gas)
        }

        fn report_error(
            &mut self,
            delivery: &Delivery<'_>,
            error: &ResultError,
            gas: &mut GasMeter,
            board: &BoardView<'_>,
        ) -> CallResult {
            self.observe(delivery, board, ResultKind::Error, Some(error.code));
            self.run(gas)
        }
    }

    struct Fixture {
        board: RequestBoard,
        registry: InMemoryRegistry,
        consumers: Consumers,
        balances: Balances,
        rad_hash: [u8; 32],
        seen: Arc<Mutex<Seen>>,
    }

    impl Fixture {
        fn new() -> Self {
            let deploy = TxContext::call(OWNER, 1, NOW);
            let mut board = RequestBoard::new(BoardConfig::default(), &deploy).expect("deploy");
            board
                .set_reporters(&deploy, &[REPORTER])
                .expect("set reporters");
            let mut registry = InMemoryRegistry::new();
            let rad_hash = registry.verify_and_register(b"price feed", 32);
            let mut balances = Balances::new();
            balances.credit(REQUESTER, 1_000_000).expect("credit");
            Self {
                board,
                registry,
                consumers: Consumers::new(),
                balances,
                rad_hash,
                seen: Arc::new(Mutex::new(Seen::default())),
            }
        }

        fn with_consumer(mut self, behavior: Behavior) -> Self {
            self.consumers.register(
                REQUESTER,
                Box::new(Recorder {
                    behavior,
                    seen: Arc::clone(&self.seen),
                }),
            );
            self
        }

        fn post(&mut self, value: Amount, callback_gas_limit: u64) -> Result<QueryId> {
            self.balances.deposit(REQUESTER, value).expect("deposit");
            let tx = TxContext::call(REQUESTER, 2, NOW).with_value(value);
            let mut env = Env::new(&self.registry, &mut self.consumers, &mut self.balances);
            self.board.post(
                &mut env,
                &tx,
                QueryDefinition::Verified(self.rad_hash),
                Sla {
                    committee_size: 10,
                    witness_reward: 1_000_000,
                    max_result_size: 32,
                },
                callback_gas_limit,
            )
        }

        fn report(&mut self, caller: Address, query_id: QueryId, payload: Vec<u8>) -> Result<Amount> {
            let tx = TxContext::call(caller, 3, NOW + 60);
            let mut env = Env::new(&self.registry, &mut self.consumers, &mut self.balances);
            self.board.report(
                &mut env,
                &tx,
                ReportEntry {
                    query_id,
                    timestamp: NOW + 30,
                    tally_hash: [0xAB; 32],
                    payload,
                },
            )
        }

        fn fetch(&mut self, caller: Address, query_id: QueryId, block: u64) -> Result<Response> {
            let tx = TxContext::call(caller, block, NOW + 120);
            let mut env = Env::new(&self.registry, &mut self.consumers, &mut self.balances);
            self.board.fetch_query_response(&mut env, &tx, query_id)
        }
    }

    #[test]
    fn test_post_report_scenario() {
        let mut fx = Fixture::new();
        let id = fx.post(100, 0).expect("post");
        assert_eq!(id, 1);
        assert_eq!(fx.board.query_status(id), QueryStatus::Posted);
        assert_eq!(fx.board.query_request(id).expect("request").reward, 100);

        let err = fx.report(STRANGER, id, vec![0x01]).expect_err("stranger");
        assert!(matches!(err, BoardError::Unauthorized { .. }));

        let paid = fx.report(REPORTER, id, vec![0x01]).expect("report");
        assert_eq!(paid, 100);
        assert_eq!(fx.board.query_status(id), QueryStatus::Reported);
        assert_eq!(fx.board.query_request(id).expect("request").reward, 0);
        assert_eq!(fx.balances.balance_of(&REPORTER), 100);

        let response = fx.board.query_response(id).expect("query").expect("response");
        assert_eq!(response.payload, vec![0x01]);
        assert_eq!(response.timestamp, NOW + 30);
        assert_eq!(response.reporter, REPORTER);
        fx.board.audit_escrow().expect("balanced");
    }

    #[test]
    fn test_upgrade_reward_scenario() {
        let mut fx = Fixture::new();
        let id = fx.post(100, 0).expect("post");
        let tx = TxContext::call(STRANGER, 2, NOW).with_value(50);
        assert_eq!(fx.board.upgrade_reward(&tx, id).expect("upgrade"), 150);

        fx.report(REPORTER, id, vec![0x01]).expect("report");
        let err = fx.board.upgrade_reward(&tx, id).expect_err("reported");
        assert!(matches!(
            err,
            BoardError::NotPosted {
                status: QueryStatus::Reported,
                ..
            }
        ));
    }

    #[test]
    fn test_second_report_fails() {
        let mut fx = Fixture::new();
        let id = fx.post(100, 0).expect("post");
        fx.report(REPORTER, id, vec![0x01]).expect("report");
        let err = fx.report(REPORTER, id, vec![0x01]).expect_err("again");
        assert!(matches!(err, BoardError::NotPosted { .. }));
        assert_eq!(fx.balances.balance_of(&REPORTER), 100);
    }

    #[test]
    fn test_invalid_results() {
        let mut fx = Fixture::new();
        let id = fx.post(100, 0).expect("post");
        let err = fx.report(REPORTER, id, vec![]).expect_err("empty");
        assert!(matches!(err, BoardError::InvalidResult(_)));
        assert_eq!(fx.board.query_status(id), QueryStatus::Posted);
        assert_eq!(fx.board.query_request(id).expect("request").reward, 100);
    }

    #[test]
    fn test_insufficient_reward() {
        let mut fx = Fixture::new();
        fx.balances.deposit(REQUESTER, 10).expect("deposit");
        let tx = TxContext::call(REQUESTER, 2, NOW).with_value(10).with_gas_price(1);
        let mut env = Env::new(&fx.registry, &mut fx.consumers, &mut fx.balances);
        let err = fx
            .board
            .post(
                &mut env,
                &tx,
                QueryDefinition::Verified(fx.rad_hash),
                Sla {
                    committee_size: 10,
                    witness_reward: 1_000_000,
                    max_result_size: 32,
                },
                0,
            )
            .expect_err("too cheap");
        assert!(matches!(
            err,
            BoardError::InsufficientReward {
                paid: 10,
                required: 88_200
            }
        ));
        assert_eq!(fx.board.next_query_id(), 1);
        assert!(fx.board.events().iter().all(|r| r.event.name() != "QueryPosted"));
    }

    #[test]
    fn test_callback_requires_capability() {
        let mut fx = Fixture::new();
        let err = fx.post(100, 50_000).expect_err("no consumer");
        assert_eq!(err.to_string(), format!("invalid callback recipient: {REQUESTER}"));

        let mut fx = Fixture::new().with_consumer(Behavior::Accept);
        let err = fx.post(100, 10_000_000).expect_err("limit");
        assert!(matches!(err, BoardError::CallbackGasLimitTooHigh { .. }));
    }

    #[test]
    fn test_successful_callback_delivers() {
        let mut fx = Fixture::new().with_consumer(Behavior::Accept);
        let id = fx.post(100, 50_000).expect("post");
        let paid = fx.report(REPORTER, id, vec![0x18, 0x2A]).expect("report");
        assert_eq!(paid, 100);
        assert_eq!(fx.board.query_status(id), QueryStatus::Delivered);

        let response = fx.board.query_response(id).expect("query").expect("response");
        assert!(response.payload.is_empty());
        assert_eq!(response.tally_hash, [0xAB; 32]);

        let last = fx.board.events().last().expect("event");
        assert_eq!(
            last.event,
            BoardEvent::ResponseDelivered {
                query_id: id,
                payload: vec![0x18, 0x2A],
                callback_gas_used: 21_000,
            }
        );

        let seen = fx.seen.lock().expect("lock");
        assert_eq!(seen.kinds, vec![ResultKind::Value]);
        // The consumer already sees the query settled with no reward left.
        assert_eq!(seen.observed, vec![(QueryStatus::Undeliverable, 0)]);
    }

    #[test]
    fn test_reverting_callback_still_pays() {
        let mut fx = Fixture::new().with_consumer(Behavior::Revert);
        let id = fx.post(100, 50_000).expect("post");
        let paid = fx.report(REPORTER, id, vec![0x01]).expect("report");
        assert_eq!(paid, 100);
        assert_eq!(fx.balances.balance_of(&REPORTER), 100);
        assert_eq!(fx.board.query_status(id), QueryStatus::Undeliverable);

        let response = fx.board.query_response(id).expect("query").expect("response");
        assert_eq!(response.tally_hash, [0xAB; 32]);
        assert!(response.payload.is_empty());

        match &fx.board.events().last().expect("event").event {
            BoardEvent::ResponseDeliveryFailed {
                payload,
                callback_gas_used,
                reason,
                ..
            } => {
                assert_eq!(payload, &vec![0x01]);
                assert_eq!(*callback_gas_used, 5_000);
                assert_eq!(reason, "price out of range");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_out_of_gas_callback() {
        let mut fx = Fixture::new().with_consumer(Behavior::Burn);
        let id = fx.post(100, 50_000).expect("post");
        fx.report(REPORTER, id, vec![0x01]).expect("report");
        assert_eq!(fx.board.query_status(id), QueryStatus::Undeliverable);
        match &fx.board.events().last().expect("event").event {
            BoardEvent::ResponseDeliveryFailed {
                callback_gas_used,
                reason,
                ..
            } => {
                assert_eq!(*callback_gas_used, 50_000);
                assert_eq!(reason, "exceeded gas limit");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_error_payload_dispatches_report_error() {
        let mut fx = Fixture::new().with_consumer(Behavior::Accept);
        let id = fx.post(100, 50_000).expect("post");
        let payload = wrb_codec::result::encode_error(
            ResultErrorCode::InsufficientConsensus,
            &[ciborium_value_text("51%")],
        )
        .expect("encode");
        fx.report(REPORTER, id, payload).expect("report");

        let seen = fx.seen.lock().expect("lock");
        assert_eq!(seen.kinds, vec![ResultKind::Error]);
        assert_eq!(seen.errors, vec![ResultErrorCode::InsufficientConsensus]);
    }

    fn ciborium_value_text(text: &str) -> wrb_codec::Value {
        wrb_codec::Value::Text(text.to_string())
    }

    #[test]
    fn test_missing_consumer_is_undeliverable() {
        let mut fx = Fixture::new().with_consumer(Behavior::Accept);
        let id = fx.post(100, 50_000).expect("post");
        fx.consumers.remove(&REQUESTER);
        fx.report(REPORTER, id, vec![0x01]).expect("report");
        assert_eq!(fx.board.query_status(id), QueryStatus::Undeliverable);
        match &fx.board.events().last().expect("event").event {
            BoardEvent::ResponseDeliveryFailed { reason, .. } => {
                assert_eq!(reason, "missing callback capability");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_query_result_error() {
        let mut fx = Fixture::new();
        let id = fx.post(100, 0).expect("post");
        let payload = wrb_codec::result::encode_error(
            ResultErrorCode::HttpError,
            &[ciborium_value_text("404")],
        )
        .expect("encode");
        fx.report(REPORTER, id, payload).expect("report");
        let error = fx.board.query_result_error(id).expect("error");
        assert_eq!(error.code, ResultErrorCode::HttpError);

        let id = fx.post(100, 0).expect("post");
        assert!(matches!(
            fx.board.query_result_error(id),
            Err(BoardError::InvalidResult(_))
        ));
    }

    #[test]
    fn test_batch_skips_malformed_entry() {
        let mut fx = Fixture::new();
        let ids: Vec<QueryId> = (0..6).map(|i| fx.post(100 + i, 0).expect("post")).collect();
        let mut entries: Vec<ReportEntry> = ids
            .iter()
            .map(|&query_id| ReportEntry {
                query_id,
                timestamp: 0,
                tally_hash: [0xCD; 32],
                payload: vec![0x01],
            })
            .collect();
        entries[2].tally_hash = [0; 32];

        let tx = TxContext::call(REPORTER, 4, NOW + 60);
        let mut payments = CountingPayments::new(&mut fx.balances);
        let mut env = Env::new(&fx.registry, &mut fx.consumers, &mut payments);
        let total = fx
            .board
            .report_batch(&mut env, &tx, entries, true)
            .expect("batch");

        assert_eq!(total, 100 + 101 + 103 + 104 + 105);
        assert_eq!(payments.transfers, vec![(REPORTER, total)]);
        assert_eq!(fx.balances.balance_of(&REPORTER), total);
        assert_eq!(fx.board.query_status(ids[2]), QueryStatus::Posted);
        assert_eq!(
            fx.board.query_response(ids[0]).expect("query").expect("response").timestamp,
            NOW + 60
        );
        let errors: Vec<_> = fx
            .board
            .events()
            .iter()
            .filter(|r| r.event.name() == "BatchReportError")
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].event.query_id(), Some(ids[2]));
        fx.board.audit_escrow().expect("balanced");
    }

    #[test]
    fn test_quiet_batch_emits_no_error_events() {
        let mut fx = Fixture::new();
        let id = fx.post(100, 0).expect("post");
        let tx = TxContext::call(REPORTER, 4, NOW + 60);
        let mut payments = CountingPayments::new(&mut fx.balances);
        let mut env = Env::new(&fx.registry, &mut fx.consumers, &mut payments);
        let entries = vec![
            ReportEntry {
                query_id: id,
                timestamp: NOW + 3_600,
                tally_hash: [0xCD; 32],
                payload: vec![0x01],
            },
            ReportEntry {
                query_id: 42,
                timestamp: 0,
                tally_hash: [0xCD; 32],
                payload: vec![0x01],
            },
        ];
        let total = fx
            .board
            .report_batch(&mut env, &tx, entries, false)
            .expect("batch");
        assert_eq!(total, 0);
        assert!(payments.transfers.is_empty());
        assert!(fx
            .board
            .events()
            .iter()
            .all(|r| r.event.name() != "BatchReportError"));
    }

    #[test]
    fn test_failed_payment_reverts_report() {
        let mut fx = Fixture::new();
        let id = fx.post(100, 0).expect("post");
        let events_before = fx.board.events().len();
        fx.balances.reject_transfers_to(REPORTER);

        let err = fx.report(REPORTER, id, vec![0x01]).expect_err("payment");
        assert!(matches!(err, BoardError::Payment(_)));
        assert_eq!(fx.board.query_status(id), QueryStatus::Posted);
        assert_eq!(fx.board.query_request(id).expect("request").reward, 100);
        assert_eq!(fx.board.escrow_held(), 100);
        assert_eq!(fx.board.events().len(), events_before);
    }

    #[test]
    fn test_fetch_terminal_query() {
        let mut fx = Fixture::new();
        let id = fx.post(100, 0).expect("post");

        let err = fx.fetch(REQUESTER, id, 3).expect_err("posted");
        assert!(matches!(err, BoardError::NotFetchable { .. }));

        fx.report(REPORTER, id, vec![0x01]).expect("report");
        let err = fx.fetch(STRANGER, id, 3).expect_err("stranger");
        assert!(matches!(err, BoardError::Unauthorized { .. }));

        let response = fx.fetch(REQUESTER, id, 3).expect("fetch");
        assert_eq!(response.payload, vec![0x01]);
        assert_eq!(fx.board.query_status(id), QueryStatus::Void);

        let err = fx.fetch(REQUESTER, id, 3).expect_err("purged");
        assert!(matches!(err, BoardError::UnknownQuery(_)));
    }

    #[test]
    fn test_fetch_expired_query_refunds() {
        let mut fx = Fixture::new();
        let id = fx.post(100, 0).expect("post");
        let expiry = fx.board.config().query_expiry_blocks;
        let before = fx.balances.balance_of(&REQUESTER);

        let response = fx.fetch(REQUESTER, id, 2 + expiry).expect("fetch");
        assert_eq!(response, Response::default());
        assert_eq!(fx.balances.balance_of(&REQUESTER), before + 100);
        assert_eq!(fx.board.escrow_held(), 0);
        assert_eq!(fx.board.query_status(id), QueryStatus::Void);
    }

    #[test]
    fn test_estimates() {
        let mut fx = Fixture::new();
        assert!(
            fx.board.estimate_base_fee_with_callback(10, 32, 1) > fx.board.estimate_base_fee(10, 32)
        );
        let id = fx.post(500, 0).expect("post");
        let (revenue, expense) = fx.board.estimate_report_earnings(&[id, 99], 0, 0);
        assert_eq!((revenue, expense), (500, 0));
    }

    #[test]
    fn test_ownership_events() {
        let mut fx = Fixture::new();
        let next = Address::repeat(0xBB);
        fx.board
            .transfer_ownership(&TxContext::call(OWNER, 5, NOW), next)
            .expect("propose");
        assert_eq!(fx.board.pending_owner(), Some(next));
        fx.board
            .accept_ownership(&TxContext::call(next, 6, NOW))
            .expect("accept");
        assert_eq!(fx.board.owner(), next);
        assert!(fx.board.is_upgradable_from(&next));

        let names: Vec<&str> = fx.board.events().iter().map(|r| r.event.name()).collect();
        assert_eq!(
            names,
            vec![
                "OwnershipTransferred",
                "ReportersSet",
                "OwnershipTransferStarted",
                "OwnershipTransferred"
            ]
        );
        assert_eq!(fx.board.events_since(2).len(), 2);
    }
}
