use proptest::prelude::*;
use wrb_board::{
    BoardConfig, BoardError, Balances, Consumers, Env, InMemoryRegistry, ReportEntry, RequestBoard,
    TxContext,
};
use wrb_types::{Address, Amount, QueryDefinition, QueryId, QueryStatus, Sla};

const OWNER: Address = Address::repeat(0xAA);
const REQUESTER: Address = Address::repeat(0x01);
const REPORTER: Address = Address::repeat(0x02);

struct Harness {
    board: RequestBoard,
    registry: InMemoryRegistry,
    consumers: Consumers,
    balances: Balances,
}

impl Harness {
    fn new() -> Self {
        let deploy = TxContext::call(OWNER, 1, 1_000);
        let mut board = RequestBoard::new(BoardConfig::default(), &deploy).expect("deploy");
        board.set_reporters(&deploy, &[REPORTER]).expect("reporters");
        let mut balances = Balances::new();
        balances.credit(REQUESTER, u128::from(u64::MAX)).expect("credit");
        Self {
            board,
            registry: InMemoryRegistry::new(),
            consumers: Consumers::new(),
            balances,
        }
    }

    fn post(&mut self, value: Amount) -> QueryId {
        self.balances.deposit(REQUESTER, value).expect("deposit");
        let tx = TxContext::call(REQUESTER, 2, 1_000).with_value(value);
        let mut env = Env::new(&self.registry, &mut self.consumers, &mut self.balances);
        self.board
            .post(
                &mut env,
                &tx,
                QueryDefinition::Bytecode(vec![0x0A, 0x01]),
                Sla {
                    committee_size: 3,
                    witness_reward: 1_000_000,
                    max_result_size: 16,
                },
                0,
            )
            .expect("post")
    }

    fn report(&mut self, caller: Address, entry: ReportEntry) -> Result<Amount, BoardError> {
        let tx = TxContext::call(caller, 3, 2_000);
        let mut env = Env::new(&self.registry, &mut self.consumers, &mut self.balances);
        self.board.report(&mut env, &tx, entry)
    }
}

fn entry(query_id: QueryId) -> ReportEntry {
    ReportEntry {
        query_id,
        timestamp: 1_500,
        tally_hash: [0xAB; 32],
        payload: vec![0x01],
    }
}

proptest! {
    /// Property: identifiers are distinct and strictly increasing
    #[test]
    fn prop_query_ids_strictly_increase(rewards in prop::collection::vec(1u64..1_000_000, 1..40)) {
        let mut harness = Harness::new();
        let ids: Vec<QueryId> = rewards
            .iter()
            .map(|reward| harness.post(u128::from(*reward)))
            .collect();
        for pair in ids.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
        prop_assert_eq!(ids[0], 1);
        prop_assert_eq!(harness.board.next_query_id(), ids.len() as u64 + 1);
    }

    /// Property: a posted reward is positive, and zero right after reporting
    #[test]
    fn prop_reward_zeroed_on_report(reward in 1u64..u64::MAX, upgrade in 0u64..1_000) {
        let mut harness = Harness::new();
        let id = harness.post(u128::from(reward));
        harness.balances.credit(REQUESTER, u128::from(upgrade)).expect("credit");
        harness.balances.deposit(REQUESTER, u128::from(upgrade)).expect("deposit");
        let tx = TxContext::call(REQUESTER, 2, 1_000).with_value(u128::from(upgrade));
        harness.board.upgrade_reward(&tx, id).expect("upgrade");

        let expected = u128::from(reward) + u128::from(upgrade);
        prop_assert_eq!(harness.board.query_request(id).expect("request").reward, expected);

        let paid = harness.report(REPORTER, entry(id)).expect("report");
        prop_assert_eq!(paid, expected);
        prop_assert_eq!(harness.board.query_request(id).expect("request").reward, 0);
        prop_assert_eq!(harness.board.escrow_held(), 0);
        prop_assert!(harness.board.audit_escrow().is_ok());
    }

    /// Property: reporting a query that is not posted fails with NotPosted,
    /// whoever the caller is
    #[test]
    fn prop_report_not_posted_always_fails(id in 0u64..10, reported in any::<bool>()) {
        let mut harness = Harness::new();
        let posted = harness.post(10);
        if reported {
            harness.report(REPORTER, entry(posted)).expect("report");
        }
        let target = if reported { posted } else { id.saturating_add(2) };

        let err = harness.report(REPORTER, entry(target)).expect_err("not posted");
        prop_assert!(
            matches!(err, BoardError::NotPosted { .. }),
            "unexpected error: {}",
            err
        );
        prop_assert_ne!(harness.board.query_status(target), QueryStatus::Posted);
    }

    /// Property: an empty payload or zero tally hash is always InvalidResult
    #[test]
    fn prop_invalid_results_rejected(zero_hash in any::<bool>(), payload_len in 0usize..4) {
        prop_assume!(zero_hash || payload_len == 0);
        let mut harness = Harness::new();
        let id = harness.post(10);
        let mut bad = entry(id);
        bad.payload = vec![0x01; payload_len];
        if zero_hash {
            bad.tally_hash = [0; 32];
        }
        let err = harness.report(REPORTER, bad).expect_err("invalid");
        prop_assert!(matches!(err, BoardError::InvalidResult(_)));
        prop_assert_eq!(harness.board.query_status(id), QueryStatus::Posted);
        prop_assert_eq!(harness.board.escrow_held(), 10);
    }
}
